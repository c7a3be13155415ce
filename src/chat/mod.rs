pub mod slack;

use async_trait::async_trait;

use crate::error::Result;

/// A chat message addressed to one or more agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Unique per delivered message; used for deduplication.
    pub id: String,
    pub timestamp: String,
    pub sender_id: String,
    pub content: String,
    pub channel: String,
    /// Agent ids, in order of first mention.
    pub mentions: Vec<String>,
    /// Thread timestamp when the message was posted inside a thread.
    pub reply_to: Option<String>,
}

impl InboundMessage {
    /// Thread the conversation lives in: the parent thread, or this message
    /// itself when it starts one.
    pub fn thread(&self) -> &str {
        self.reply_to.as_deref().unwrap_or(&self.timestamp)
    }

    /// Key under which messages are serialized: one conversation per thread.
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.channel, self.thread())
    }

    /// Workflow key for one agent in this conversation.
    pub fn workflow_key(&self, agent_id: &str) -> String {
        format!("{}:{agent_id}", self.conversation_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
    pub thread_id: Option<String>,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(&self, message: &OutboundMessage) -> Result<()>;
}
