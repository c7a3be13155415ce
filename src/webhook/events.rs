use serde::Deserialize;

/// Top-level Slack Events API payload, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackPayload {
    UrlVerification { challenge: String },
    EventCallback(EventCallback),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
pub struct EventCallback {
    pub event_id: String,
    pub event: SlackEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(MessageEvent),
    Message(MessageEvent),
    #[serde(other)]
    Unsupported,
}

/// Fields shared by `app_mention` and `message` events.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl MessageEvent {
    /// Messages not typed by a person: bot posts (including our own replies),
    /// edits, deletions, joins. Thread broadcasts still count as user messages.
    pub fn is_ignored(&self) -> bool {
        if self.bot_id.is_some() || self.user.is_none() {
            return true;
        }
        !matches!(self.subtype.as_deref(), None | Some("thread_broadcast"))
    }

    /// Identifies the message itself, so the `app_mention` and `message`
    /// copies of one post collapse to the same id.
    pub fn message_id(&self) -> String {
        format!("{}:{}", self.channel, self.ts)
    }

    /// Thread parent, when the message is a reply rather than a thread root.
    pub fn reply_to(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|parent| *parent != self.ts)
    }
}

impl SlackEvent {
    pub fn message(&self) -> Option<&MessageEvent> {
        match self {
            SlackEvent::AppMention(event) | SlackEvent::Message(event) => Some(event),
            SlackEvent::Unsupported => None,
        }
    }
}
