pub mod claude;
pub mod definition;
pub mod functions;
pub mod orchestrator;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::workflow::FunctionCall;

use definition::AgentDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior message of a conversation, replayed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Natural-language text plus the function calls the model proposed, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_response(
        &self,
        agent: &AgentDefinition,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<LlmResponse>;
}
