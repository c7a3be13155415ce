use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatTransport, OutboundMessage};
use crate::error::{AppError, Result};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Slack rejects `text` longer than this.
const MAX_TEXT_CHARS: usize = 40_000;

pub struct SlackClient {
    client: Client,
    bot_token: String,
    api_url: String,
}

impl SlackClient {
    pub fn new(bot_token: &str) -> Self {
        Self::with_api_url(bot_token, SLACK_API_URL)
    }

    pub fn with_api_url(bot_token: &str, api_url: &str) -> Self {
        Self {
            client: Client::new(),
            bot_token: bot_token.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

/// Slack Web API envelope; HTTP 200 even on failure.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl ChatTransport for SlackClient {
    async fn post_message(&self, message: &OutboundMessage) -> Result<()> {
        let text = truncate_text(&message.text, MAX_TEXT_CHARS);
        let request = PostMessageRequest {
            channel: &message.channel,
            text: &text,
            thread_ts: message.thread_id.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.bot_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Slack(format!(
                "chat.postMessage returned {status}: {body}"
            )));
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(AppError::Slack(format!(
                "chat.postMessage failed: {}",
                body.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::debug!(
            channel = %message.channel,
            thread = ?message.thread_id,
            "Posted Slack message"
        );
        Ok(())
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
fn truncate_text(text: &str, max_chars: usize) -> std::borrow::Cow<'_, str> {
    const MARKER: &str = "\n…(truncated)";

    if text.chars().count() <= max_chars {
        return std::borrow::Cow::Borrowed(text);
    }

    let keep = max_chars.saturating_sub(MARKER.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(MARKER);
    std::borrow::Cow::Owned(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate_text("hello", 10), "hello");
    }

    #[test]
    fn test_long_text_is_cut_on_char_boundary() {
        let text = "é".repeat(50);
        let truncated = truncate_text(&text, 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.ends_with("(truncated)"));
    }

    #[test]
    fn test_request_omits_missing_thread() {
        let value = serde_json::to_value(PostMessageRequest {
            channel: "C1",
            text: "hi",
            thread_ts: None,
        })
        .unwrap();
        assert!(value.get("thread_ts").is_none());
    }

    #[test]
    fn test_api_error_envelope() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        assert!(!body.ok);
        assert_eq!(body.error.as_deref(), Some("channel_not_found"));
    }
}
