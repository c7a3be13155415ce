pub mod dedup;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::agent::orchestrator::AgentOrchestrator;
use crate::chat::InboundMessage;

/// Workers with nothing to do for this long shut down; the next message for
/// their conversation starts a fresh one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: InboundMessage);
}

#[async_trait]
impl MessageHandler for AgentOrchestrator {
    async fn handle(&self, message: InboundMessage) {
        let outcomes = self.handle_message(&message).await;
        for outcome in outcomes {
            tracing::info!(
                conversation = %message.conversation_key(),
                agent = %outcome.agent_id,
                calls = outcome.records.len(),
                succeeded = outcome.records.iter().filter(|r| r.result.is_success()).count(),
                "Agent turn completed"
            );
        }
    }
}

type Senders = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<InboundMessage>>>>;

/// Per-conversation sequential message queue.
///
/// Each conversation (channel + thread) gets its own channel and worker task so
/// its messages are handled strictly in arrival order, while different
/// conversations proceed concurrently.
pub struct ConversationQueue<H: MessageHandler> {
    handler: Arc<H>,
    senders: Senders,
    idle_timeout: Duration,
}

impl<H: MessageHandler> ConversationQueue<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self::with_idle_timeout(handler, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(handler: Arc<H>, idle_timeout: Duration) -> Self {
        Self {
            handler,
            senders: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Enqueue a message for its conversation, starting a worker if none is running.
    pub fn enqueue(&self, message: InboundMessage) {
        let key = message.conversation_key();
        let mut senders = self.senders.lock();

        let message = match senders.get(&key) {
            Some(sender) => match sender.send(message) {
                Ok(()) => {
                    tracing::debug!(conversation = %key, "Queued message for running worker");
                    return;
                }
                // Worker is gone; start over with the returned message
                Err(mpsc::error::SendError(message)) => {
                    senders.remove(&key);
                    message
                }
            },
            None => message,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        senders.insert(key.clone(), tx);
        drop(senders);

        tracing::debug!(conversation = %key, "Starting conversation worker");
        tokio::spawn(run_worker(
            key,
            message,
            rx,
            Arc::clone(&self.handler),
            Arc::clone(&self.senders),
            self.idle_timeout,
        ));
    }

    /// Conversations with a live worker.
    pub fn active_conversations(&self) -> usize {
        self.senders.lock().len()
    }
}

async fn run_worker<H: MessageHandler>(
    key: String,
    first: InboundMessage,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    handler: Arc<H>,
    senders: Senders,
    idle_timeout: Duration,
) {
    handler.handle(first).await;

    loop {
        let message = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => {
                // Retire under the lock so a concurrent enqueue either lands
                // in this channel first or starts a new worker afterwards.
                let pending = {
                    let mut senders = senders.lock();
                    match rx.try_recv() {
                        Ok(message) => Some(message),
                        Err(_) => {
                            senders.remove(&key);
                            None
                        }
                    }
                };
                match pending {
                    Some(message) => message,
                    None => break,
                }
            }
        };

        handler.handle(message).await;
    }

    tracing::debug!(conversation = %key, "Conversation worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    struct Recorder {
        tx: mpsc::UnboundedSender<String>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: InboundMessage) {
            if message.content == "wait" {
                self.release.notified().await;
            } else if message.content == "release" {
                self.release.notify_one();
            } else {
                // Give a later message a chance to overtake if ordering were broken
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = self.tx.send(format!("{}|{}", message.channel, message.content));
        }
    }

    fn message(channel: &str, ts: &str, content: &str) -> InboundMessage {
        InboundMessage {
            id: format!("{channel}:{ts}"),
            timestamp: ts.to_string(),
            sender_id: "U1".to_string(),
            content: content.to_string(),
            channel: channel.to_string(),
            mentions: vec!["developer".to_string()],
            reply_to: Some("1.0".to_string()),
        }
    }

    fn queue(idle: Duration) -> (ConversationQueue<Recorder>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Recorder {
            tx,
            release: Arc::new(Notify::new()),
        });
        (ConversationQueue::with_idle_timeout(handler, idle), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("handler did not run in time")
            .expect("handler channel closed")
    }

    #[tokio::test]
    async fn test_messages_of_one_conversation_run_in_order() {
        let (queue, mut rx) = queue(DEFAULT_IDLE_TIMEOUT);

        for (i, content) in ["one", "two", "three"].iter().enumerate() {
            queue.enqueue(message("C1", &format!("1.{i}"), content));
        }

        assert_eq!(next(&mut rx).await, "C1|one");
        assert_eq!(next(&mut rx).await, "C1|two");
        assert_eq!(next(&mut rx).await, "C1|three");
        assert_eq!(queue.active_conversations(), 1);
    }

    #[tokio::test]
    async fn test_conversations_do_not_block_each_other() {
        let (queue, mut rx) = queue(DEFAULT_IDLE_TIMEOUT);

        queue.enqueue(message("C1", "1.1", "wait"));
        queue.enqueue(message("C2", "1.1", "release"));

        assert_eq!(next(&mut rx).await, "C2|release");
        assert_eq!(next(&mut rx).await, "C1|wait");
        assert_eq!(queue.active_conversations(), 2);
    }

    #[tokio::test]
    async fn test_idle_worker_retires_and_restarts() {
        let (queue, mut rx) = queue(Duration::from_millis(20));

        queue.enqueue(message("C1", "1.1", "first"));
        assert_eq!(next(&mut rx).await, "C1|first");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.active_conversations(), 0);

        queue.enqueue(message("C1", "1.2", "second"));
        assert_eq!(next(&mut rx).await, "C1|second");
    }
}
