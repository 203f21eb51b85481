use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{ChatMessage, LlmClient, ToolCall, ToolSpec};
use crate::session::ConversationContext;
use crate::tools::{ToolCommand, ToolRegistry};
use crate::AgentError;

pub const APOLOGY: &str = "I apologize, but I encountered an error processing your request. \
Please try rephrasing your question.";
pub const MISSING_USER_REPLY: &str = "I need a user id to personalize your request.";
pub const EMPTY_MESSAGE_REPLY: &str = "Please tell me what you are shopping for.";
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

const SYSTEM_PROMPT: &str = "You are SmartScoop, a shopping assistant. Use the tools to search \
products, fetch personalized recommendations, check whether an upcoming seasonal sale is worth \
waiting for, and update the user's stored preferences. Only act on the requesting user's own \
profile. Answer concisely using the tool results.";

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    guardrails: GuardrailPolicy,
    specs: Vec<ToolSpec>,
    max_tool_rounds: u32,
}

impl AgentRuntime {
    /// Fails when an advertised tool has no handler.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        guardrails: GuardrailPolicy,
        max_tool_rounds: u32,
    ) -> Result<Self, AgentError> {
        tools.ensure_complete()?;
        let specs = tools.specs();
        Ok(Self { llm, tools, guardrails, specs, max_tool_rounds: max_tool_rounds.max(1) })
    }

    /// Always yields a reply string unless the agent itself is misconfigured.
    pub async fn process_message(
        &self,
        context: &mut ConversationContext,
        user_id: &str,
        message: &str,
    ) -> Result<String, AgentError> {
        let user_id = user_id.trim();
        let message = message.trim();
        if user_id.is_empty() {
            return Ok(MISSING_USER_REPLY.to_string());
        }
        if message.is_empty() {
            return Ok(EMPTY_MESSAGE_REPLY.to_string());
        }

        let input = format!("User {user_id} requests: {message}");
        info!(
            event_name = "agent.turn.started",
            user_id,
            session_id = context.session_id(),
            "processing message"
        );

        match self.run_loop(context, user_id, &input).await {
            Ok(reply) => {
                context.record(input, reply.clone());
                info!(event_name = "agent.turn.completed", user_id, "message processed");
                Ok(reply)
            }
            Err(AgentError::Configuration(reason)) => {
                error!(
                    event_name = "agent.turn.misconfigured",
                    user_id,
                    reason = %reason,
                    "agent configuration error"
                );
                Err(AgentError::Configuration(reason))
            }
            Err(other) => {
                warn!(
                    event_name = "agent.turn.failed",
                    user_id,
                    error = %other,
                    "message processing failed"
                );
                Ok(APOLOGY.to_string())
            }
        }
    }

    async fn run_loop(
        &self,
        context: &ConversationContext,
        user_id: &str,
        input: &str,
    ) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(context.turns().len() * 2 + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(context.history());
        messages.push(ChatMessage::user(input));

        for round in 0..self.max_tool_rounds {
            let completion = self.llm.chat(&messages, &self.specs).await?;
            if completion.tool_calls.is_empty() {
                return completion
                    .content
                    .ok_or_else(|| {
                        AgentError::Upstream("model returned an empty reply".to_string())
                    });
            }

            debug!(
                event_name = "agent.turn.tool_round",
                round,
                calls = completion.tool_calls.len(),
                "model requested tools"
            );
            let calls = completion.tool_calls.clone();
            messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls,
            ));
            for call in &calls {
                let output = self.run_tool(user_id, call).await?;
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        Err(AgentError::ToolRoundsExceeded(self.max_tool_rounds))
    }

    /// Tool-level failures are reported back to the model as text; only
    /// configuration faults propagate.
    async fn run_tool(&self, user_id: &str, call: &ToolCall) -> Result<String, AgentError> {
        let command = match ToolCommand::parse(&call.name, &call.arguments) {
            Ok(command) => command,
            Err(error) => {
                warn!(
                    event_name = "agent.tool.invalid_arguments",
                    tool = %call.name,
                    error = %error,
                    "rejected tool call"
                );
                return Ok(format!("Tool error: {error}"));
            }
        };

        match self.guardrails.evaluate(user_id, &command) {
            GuardrailDecision::Allow => {}
            GuardrailDecision::Deny { reason_code, user_message } => {
                warn!(
                    event_name = "agent.tool.denied",
                    tool = %command.name(),
                    reason_code,
                    "guardrail denied tool call"
                );
                return Ok(format!("Denied: {user_message}"));
            }
            GuardrailDecision::Degrade { reason_code, user_message } => {
                info!(
                    event_name = "agent.tool.degraded",
                    tool = %command.name(),
                    reason_code,
                    "guardrail degraded tool call"
                );
                return Ok(user_message);
            }
        }

        let tool = command.name();
        match self.tools.dispatch(command).await {
            Ok(output) => {
                info!(event_name = "agent.tool.completed", tool = %tool, "tool executed");
                Ok(output)
            }
            Err(AgentError::Configuration(reason)) => Err(AgentError::Configuration(reason)),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = %tool,
                    error = %error,
                    "tool execution failed"
                );
                Ok(format!("Tool error: {tool} is unavailable right now."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use smartscoop_core::errors::ApplicationError;

    use super::{AgentRuntime, APOLOGY, EMPTY_MESSAGE_REPLY};
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::{ChatCompletion, ChatMessage, LlmClient, LlmError, Role, ToolCall, ToolSpec};
    use crate::session::ConversationContext;
    use crate::tools::{Tool, ToolCommand, ToolName, ToolRegistry};
    use crate::AgentError;

    enum Step {
        Reply(&'static str),
        Call(&'static str, &'static str),
        Fail(LlmError),
    }

    /// Replays scripted completions and records what the model was sent.
    struct ScriptedLlm {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self { steps: Mutex::new(steps.into()), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ChatCompletion, LlmError> {
            self.seen.lock().await.push(messages.to_vec());
            match self.steps.lock().await.pop_front() {
                Some(Step::Reply(text)) => {
                    Ok(ChatCompletion { content: Some(text.to_string()), tool_calls: Vec::new() })
                }
                Some(Step::Call(name, arguments)) => Ok(ChatCompletion {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: format!("call-{name}"),
                        name: name.to_string(),
                        arguments: arguments.to_string(),
                    }],
                }),
                Some(Step::Fail(error)) => Err(error),
                None => {
                    Ok(ChatCompletion { content: Some("done".to_string()), tool_calls: Vec::new() })
                }
            }
        }
    }

    struct EchoTool(ToolName);

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> ToolName {
            self.0
        }

        async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError> {
            match command {
                ToolCommand::ProductSearch { query, .. } if query == "broken" => {
                    Err(ApplicationError::Upstream("catalog down".to_string()))
                }
                other => Ok(format!("{} ok", other.name())),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        for tool in ToolName::ALL {
            registry.register(EchoTool(tool));
        }
        registry
    }

    fn runtime(llm: Arc<ScriptedLlm>, max_rounds: u32) -> AgentRuntime {
        AgentRuntime::new(llm, registry(), GuardrailPolicy::default(), max_rounds).expect("runtime")
    }

    fn tool_outputs(messages: &[ChatMessage]) -> Vec<String> {
        messages
            .iter()
            .filter(|message| message.role == Role::Tool)
            .filter_map(|message| message.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn plain_reply_is_recorded_in_the_transcript() {
        let llm = ScriptedLlm::new(vec![Step::Reply("Hello!")]);
        let agent = runtime(llm.clone(), 5);
        let mut context = ConversationContext::new("user123", 10);

        let reply = agent.process_message(&mut context, "user123", "hi").await.expect("reply");

        assert_eq!(reply, "Hello!");
        assert_eq!(context.turns().len(), 1);
        assert_eq!(context.turns()[0].input, "User user123 requests: hi");
        let seen = llm.seen.lock().await;
        assert_eq!(
            seen[0].last().and_then(|m| m.content.clone()).as_deref(),
            Some("User user123 requests: hi")
        );
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_to_the_model() {
        let llm = ScriptedLlm::new(vec![
            Step::Call("ProductSearch", r#"{"query": "laptop under $1000"}"#),
            Step::Reply("Here is what I found."),
        ]);
        let agent = runtime(llm.clone(), 5);
        let mut context = ConversationContext::new("user123", 10);

        let reply = agent
            .process_message(&mut context, "user123", "laptop under $1000")
            .await
            .expect("reply");

        assert_eq!(reply, "Here is what I found.");
        let seen = llm.seen.lock().await;
        assert_eq!(tool_outputs(&seen[1]), vec!["ProductSearch ok".to_string()]);
    }

    #[tokio::test]
    async fn history_is_replayed_on_the_next_turn() {
        let llm = ScriptedLlm::new(vec![Step::Reply("first"), Step::Reply("second")]);
        let agent = runtime(llm.clone(), 5);
        let mut context = ConversationContext::new("u-1", 10);

        agent.process_message(&mut context, "u-1", "one").await.expect("first");
        agent.process_message(&mut context, "u-1", "two").await.expect("second");

        let seen = llm.seen.lock().await;
        let contents: Vec<Option<String>> = seen[1].iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1].as_deref(), Some("User u-1 requests: one"));
        assert_eq!(contents[2].as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn cross_user_and_invalid_calls_become_tool_errors() {
        let llm = ScriptedLlm::new(vec![
            Step::Call(
                "UpdatePreferences",
                r#"{"user_id": "someone-else", "preferences": {"size": "L"}}"#,
            ),
            Step::Call("GetRecommendations", "{oops"),
            Step::Call("ProductSearch", r#"{"query": "broken"}"#),
            Step::Reply("ok"),
        ]);
        let agent = runtime(llm.clone(), 5);
        let mut context = ConversationContext::new("u-1", 10);

        assert_eq!(
            agent.process_message(&mut context, "u-1", "do things").await.expect("reply"),
            "ok"
        );

        let seen = llm.seen.lock().await;
        let outputs = tool_outputs(&seen[3]);
        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].starts_with("Denied:"));
        assert!(outputs[1].starts_with("Tool error: arguments for GetRecommendations"));
        assert_eq!(outputs[2], "Tool error: ProductSearch is unavailable right now.");
    }

    #[tokio::test]
    async fn exceeding_tool_rounds_yields_the_apology() {
        let llm = ScriptedLlm::new(vec![
            Step::Call("ProductSearch", r#""a""#),
            Step::Call("ProductSearch", r#""b""#),
            Step::Call("ProductSearch", r#""c""#),
        ]);
        let agent = runtime(llm, 2);
        let mut context = ConversationContext::new("u-1", 10);

        let reply = agent.process_message(&mut context, "u-1", "loop").await.expect("reply");
        assert_eq!(reply, APOLOGY);
        assert!(context.turns().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_yields_the_apology() {
        let llm = ScriptedLlm::new(vec![Step::Fail(LlmError::Status {
            status: 503,
            message: "over capacity".to_string(),
        })]);
        let agent = runtime(llm, 5);
        let mut context = ConversationContext::new("u-1", 10);

        assert_eq!(agent.process_message(&mut context, "u-1", "hi").await.expect("reply"), APOLOGY);
    }

    #[tokio::test]
    async fn rejected_credentials_escalate() {
        let llm = ScriptedLlm::new(vec![Step::Fail(LlmError::Unauthorized(401))]);
        let agent = runtime(llm, 5);
        let mut context = ConversationContext::new("u-1", 10);

        let result = agent.process_message(&mut context, "u-1", "hi").await;
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[tokio::test]
    async fn empty_input_never_reaches_the_model() {
        let llm = ScriptedLlm::new(vec![]);
        let agent = runtime(llm.clone(), 5);
        let mut context = ConversationContext::new("u-1", 10);

        assert_eq!(
            agent.process_message(&mut context, "u-1", "   ").await.expect("reply"),
            EMPTY_MESSAGE_REPLY
        );
        assert!(llm.seen.lock().await.is_empty());
    }

    #[test]
    fn incomplete_registry_is_rejected() {
        let llm = ScriptedLlm::new(vec![]);
        let result = AgentRuntime::new(llm, ToolRegistry::default(), GuardrailPolicy::default(), 5);
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }
}
