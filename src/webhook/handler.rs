use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::agent::prompt::extract_mentions;
use crate::chat::InboundMessage;
use crate::server::AppState;
use crate::webhook::events::{MessageEvent, SlackPayload};
use crate::webhook::signature::verify_signature;

pub async fn handle_slack_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(signature), Some(timestamp)) = (
        header(&headers, "x-slack-signature"),
        header(&headers, "x-slack-request-timestamp"),
    ) else {
        tracing::warn!("Missing Slack signature headers");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if let Err(e) = verify_signature(state.config.signing_secret(), timestamp, &body, signature) {
        tracing::warn!(error = %e, "Slack signature verification failed");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload: SlackPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Slack payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match payload {
        SlackPayload::UrlVerification { challenge } => {
            tracing::info!("Answering Slack URL verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        SlackPayload::EventCallback(callback) => {
            match callback.event.message() {
                Some(event) => accept_message(&state, &callback.event_id, event),
                None => tracing::debug!(event_id = %callback.event_id, "Ignoring unsupported event"),
            }
            StatusCode::OK.into_response()
        }
        SlackPayload::Unsupported => {
            tracing::debug!("Ignoring unsupported payload type");
            StatusCode::OK.into_response()
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Turn a message event into an [`InboundMessage`] and queue it when it
/// addresses at least one agent.
fn accept_message(state: &AppState, event_id: &str, event: &MessageEvent) {
    if event.is_ignored() {
        tracing::debug!(event_id, subtype = ?event.subtype, "Ignoring non-user message");
        return;
    }

    let mentions = extract_mentions(
        &event.text,
        state.orchestrator.catalog(),
        state.config.slack.bot_user_id.as_deref(),
    );
    if mentions.is_empty() {
        tracing::debug!(event_id, channel = %event.channel, "Message addresses no agent");
        return;
    }

    let message = to_inbound(event, mentions);
    if !state.dedup.first_delivery(&message.id) {
        tracing::debug!(event_id, message_id = %message.id, "Dropping duplicate delivery");
        return;
    }

    tracing::info!(
        event_id,
        channel = %message.channel,
        thread = %message.thread(),
        agents = ?message.mentions,
        "Queuing message"
    );
    state.queue.enqueue(message);
}

fn to_inbound(event: &MessageEvent, mentions: Vec<String>) -> InboundMessage {
    InboundMessage {
        id: event.message_id(),
        timestamp: event.ts.clone(),
        sender_id: event.user.clone().unwrap_or_default(),
        content: event.text.clone(),
        channel: event.channel.clone(),
        mentions,
        reply_to: event.reply_to().map(str::to_string),
    }
}
