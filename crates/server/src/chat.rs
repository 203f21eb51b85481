use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use smartscoop_agent::{AgentError, ShoppingAssistant};
use smartscoop_core::errors::{ApplicationError, InterfaceError};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    assistant: Arc<ShoppingAssistant>,
}

impl ChatState {
    pub fn new(assistant: Arc<ShoppingAssistant>) -> Self {
        Self { assistant }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub correlation_id: String,
}

pub type ChatError = (StatusCode, Json<ErrorResponse>);

pub fn router(assistant: Arc<ShoppingAssistant>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(ChatState::new(assistant))
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let correlation_id = Uuid::new_v4().to_string();

    if request.user_id.trim().is_empty() {
        return Err(reject(
            ApplicationError::InvalidInput("user_id must not be empty".to_string())
                .into_interface(correlation_id),
        ));
    }
    if request.message.trim().is_empty() {
        return Err(reject(
            ApplicationError::InvalidInput("message must not be empty".to_string())
                .into_interface(correlation_id),
        ));
    }

    info!(
        event_name = "server.chat.received",
        correlation_id = %correlation_id,
        user_id = %request.user_id,
        "chat request received"
    );

    match state.assistant.handle_message(&request.user_id, &request.message).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(failure) => {
            error!(
                event_name = "server.chat.failed",
                correlation_id = %correlation_id,
                user_id = %request.user_id,
                error = %failure,
                "chat request failed"
            );
            Err(reject(internal(failure, correlation_id)))
        }
    }
}

fn internal(failure: AgentError, correlation_id: String) -> InterfaceError {
    InterfaceError::Internal { message: failure.to_string(), correlation_id }
}

fn reject(error: InterfaceError) -> ChatError {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    // Only validation messages reach the client; other failures stay in the log.
    let detail = match &error {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
            error.user_message().to_string()
        }
    };
    (status, Json(ErrorResponse { detail, correlation_id: error.correlation_id().to_string() }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use smartscoop_agent::app::AssistantComponents;
    use smartscoop_agent::llm::{ChatCompletion, ChatMessage, LlmClient, LlmError, ToolSpec};
    use smartscoop_agent::recommender::Recommender;
    use smartscoop_agent::{SessionStore, ShoppingAssistant};
    use smartscoop_catalog::LocalProductSearch;
    use smartscoop_core::recommendation::{HashingEmbedder, RecommendationEngine};
    use smartscoop_core::seasonal::SeasonalOptimizer;
    use smartscoop_db::InMemoryUserProfileRepository;

    use crate::chat::{chat, ChatRequest, ChatState};

    struct FixedLlm {
        rejects_key: bool,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ChatCompletion, LlmError> {
            if self.rejects_key {
                return Err(LlmError::Unauthorized(401));
            }
            Ok(ChatCompletion {
                content: Some("Try the red tee.".to_string()),
                tool_calls: Vec::new(),
            })
        }
    }

    fn state(rejects_key: bool) -> State<ChatState> {
        let profiles = Arc::new(InMemoryUserProfileRepository::default());
        let engine = Arc::new(RecommendationEngine::new(HashingEmbedder::new(64)));
        let assistant = ShoppingAssistant::with_components(AssistantComponents {
            llm: Arc::new(FixedLlm { rejects_key }),
            search: Arc::new(LocalProductSearch::new(Vec::new())),
            profiles: profiles.clone(),
            optimizer: Arc::new(SeasonalOptimizer::new()),
            recommender: Arc::new(Recommender::new(engine, profiles, Vec::new())),
            sessions: SessionStore::new(Duration::from_secs(60), 10),
            max_tool_rounds: 5,
        })
        .expect("assistant");
        State(ChatState::new(Arc::new(assistant)))
    }

    fn request(user_id: &str, message: &str) -> Json<ChatRequest> {
        Json(ChatRequest { user_id: user_id.to_string(), message: message.to_string() })
    }

    #[tokio::test]
    async fn reply_is_returned_as_response() {
        let Json(body) = chat(state(false), request("user123", "what should I buy?"))
            .await
            .expect("chat should succeed");

        assert_eq!(body.response, "Try the red tee.");
    }

    #[tokio::test]
    async fn empty_fields_are_bad_requests() {
        let (status, Json(body)) =
            chat(state(false), request("", "hi")).await.expect_err("missing user id");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.detail.contains("user_id"));

        let (status, Json(body)) =
            chat(state(false), request("user123", " ")).await.expect_err("missing message");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.detail.contains("message"));
    }

    #[tokio::test]
    async fn misconfigured_agent_is_an_internal_error() {
        let (status, Json(body)) =
            chat(state(true), request("user123", "hi")).await.expect_err("configuration error");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.detail, "An unexpected internal error occurred.");
        assert!(!body.detail.contains("401"));
        assert!(!body.correlation_id.is_empty());
    }
}
