use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::agent::definition::AgentDefinition;
use crate::agent::{HistoryEntry, LanguageModel, LlmResponse, Role};
use crate::error::{AppError, Result};
use crate::workflow::FunctionCall;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }

    pub async fn send_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                AppError::ClaudeRateLimited(body)
            } else {
                AppError::ClaudeApi(format!("API returned {status}: {body}"))
            });
        }

        let body = response.json::<MessagesResponse>().await?;
        Ok(body)
    }
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    async fn generate_response(
        &self,
        agent: &AgentDefinition,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<LlmResponse> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: agent.system_prompt.clone(),
            messages: build_messages(history, message),
            tools: agent
                .functions
                .iter()
                .map(|f| ToolDefinition {
                    name: f.name.clone(),
                    description: f.description.clone(),
                    input_schema: f.parameters.clone(),
                })
                .collect(),
        };

        let response = self.send_message(&request).await?;

        tracing::info!(
            agent = %agent.id,
            response_id = %response.id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Claude response"
        );

        if response.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(agent = %agent.id, "Claude response hit max_tokens limit");
        }

        Ok(into_llm_response(response.content))
    }
}

/// Replay history followed by the new user message.
///
/// The Messages API wants alternating roles starting with `user`, so leading
/// assistant entries are dropped and consecutive same-role entries merged.
fn build_messages(history: &[HistoryEntry], message: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 1);

    let entries = history
        .iter()
        .map(|entry| (entry.role, entry.content.as_str()))
        .chain(std::iter::once((Role::User, message)))
        .skip_while(|(role, _)| *role == Role::Assistant);

    for (role, content) in entries {
        let role = match role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
                continue;
            }
            _ => {}
        }

        messages.push(Message {
            role: role.to_string(),
            content: content.to_string(),
        });
    }

    messages
}

fn into_llm_response(content: Vec<ContentBlock>) -> LlmResponse {
    let mut text = Vec::new();
    let mut function_calls = Vec::new();

    for block in content {
        match block {
            ContentBlock::Text { text: t } => text.push(t),
            ContentBlock::ToolUse { id, name, input } => function_calls.push(FunctionCall {
                id,
                name,
                arguments: input,
            }),
            ContentBlock::Other => {}
        }
    }

    LlmResponse {
        text: text.join("\n"),
        function_calls,
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A plain-text turn; tool results are folded into the text of later turns.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
