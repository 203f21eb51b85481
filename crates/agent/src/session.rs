//! Per-session conversation transcripts with idle eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::llm::ChatMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub input: String,
    pub reply: String,
}

/// Transcript of one session, oldest turn first, capped at `max_turns`.
#[derive(Clone, Debug)]
pub struct ConversationContext {
    session_id: String,
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>, max_turns: usize) -> Self {
        Self { session_id: session_id.into(), turns: Vec::new(), max_turns: max_turns.max(1) }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn record(&mut self, input: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(Turn { input: input.into(), reply: reply.into() });
        if self.turns.len() > self.max_turns {
            let overflow = self.turns.len() - self.max_turns;
            self.turns.drain(..overflow);
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [ChatMessage::user(turn.input.clone()), ChatMessage::assistant(turn.reply.clone())]
            })
            .collect()
    }
}

struct SessionEntry {
    context: Arc<Mutex<ConversationContext>>,
    last_seen: Instant,
}

/// Sessions keyed by id. Requests on the same session serialize on the
/// session's lock; distinct sessions do not contend.
pub struct SessionStore {
    ttl: Duration,
    max_turns: usize,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_turns: usize) -> Self {
        Self { ttl, max_turns, sessions: Mutex::new(HashMap::new()) }
    }

    pub async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationContext>> {
        self.session_at(session_id, Instant::now()).await
    }

    /// Returns the live session, starting a fresh one when it is absent or idle
    /// for longer than the TTL. Expired sessions are swept on the way.
    pub async fn session_at(
        &self,
        session_id: &str,
        now: Instant,
    ) -> Arc<Mutex<ConversationContext>> {
        let mut sessions = self.sessions.lock().await;
        let evicted = evict(&mut sessions, self.ttl, now);
        if evicted > 0 {
            debug!(event_name = "agent.session.evicted", evicted, "expired sessions evicted");
        }

        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| SessionEntry {
            context: Arc::new(Mutex::new(ConversationContext::new(session_id, self.max_turns))),
            last_seen: now,
        });
        entry.last_seen = now;
        Arc::clone(&entry.context)
    }

    pub async fn evict_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        evict(&mut sessions, self.ttl, now)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

fn evict(sessions: &mut HashMap<String, SessionEntry>, ttl: Duration, now: Instant) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= ttl);
    before - sessions.len()
}
