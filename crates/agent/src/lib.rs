//! Agent runtime for the shopping assistant.
//!
//! The model chooses among four tools (product search, personalized
//! recommendations, seasonal sale advice, preference updates). Every tool
//! call is parsed into a typed [`tools::ToolCommand`], checked by the
//! guardrails, and dispatched through the [`tools::ToolRegistry`].

pub mod app;
pub mod guardrails;
pub mod handlers;
pub mod llm;
pub mod recommender;
pub mod runtime;
pub mod session;
pub mod tools;

use smartscoop_core::errors::ApplicationError;
use thiserror::Error;

pub use app::ShoppingAssistant;
pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use llm::{GroqClient, LlmClient, LlmError};
pub use runtime::{AgentRuntime, APOLOGY};
pub use session::{ConversationContext, SessionStore};
pub use tools::{Tool, ToolCommand, ToolName, ToolRegistry};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent configuration error: {0}")]
    Configuration(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("model did not finish within {0} tool rounds")]
    ToolRoundsExceeded(u32),
}

impl AgentError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<ApplicationError> for AgentError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Configuration(message) => Self::Configuration(message),
            ApplicationError::Upstream(message) => Self::Upstream(message),
            ApplicationError::InvalidInput(message) => Self::InvalidInput(message),
            ApplicationError::Storage(message) => Self::Storage(message),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(error: LlmError) -> Self {
        if error.is_configuration() {
            Self::Configuration(error.to_string())
        } else {
            Self::Upstream(error.to_string())
        }
    }
}
