//! Feed hub orchestration with the tokio mpsc command pattern.
//!
//! The hub loop runs in a dedicated tokio task.  External code communicates
//! with it through a typed command channel; each subscriber gets its own
//! bounded event queue so one slow consumer cannot stall the others.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use causerie_shared::{BackendError, ChatId, FeedEvent};

/// Depth of the command channel and of each subscriber's event queue.
const CHANNEL_CAPACITY: usize = 256;

/// Hub-assigned identifier for one open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One open subscription: the handle to release it with, plus the receiving
/// half of its event queue.
///
/// Owned exclusively by one consumer for the lifetime of one selection.
/// Dropping the receiver without unsubscribing is tolerated -- the hub
/// prunes the entry on the next publish -- but explicit release is the
/// contract.
#[derive(Debug)]
pub struct Subscription<T> {
    pub id: SubscriptionId,
    pub topic: String,
    pub events: mpsc::Receiver<T>,
}

/// Commands sent *into* the hub task.
enum FeedCommand<T> {
    Subscribe {
        topic: String,
        reply: oneshot::Sender<Subscription<T>>,
    },
    Unsubscribe(SubscriptionId),
    Publish {
        topic: String,
        event: T,
    },
    Shutdown,
}

/// Cloneable handle to a running feed hub.
pub struct FeedHandle<T> {
    cmd_tx: mpsc::Sender<FeedCommand<T>>,
}

impl<T> Clone for FeedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<T: Send + 'static> FeedHandle<T> {
    /// Open a subscription on `topic`.
    ///
    /// The hub acknowledges by returning the [`Subscription`]; events
    /// published after this call resolves are queued for it.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Result<Subscription<T>, BackendError> {
        let (reply, ack) = oneshot::channel();
        self.cmd_tx
            .send(FeedCommand::Subscribe {
                topic: topic.into(),
                reply,
            })
            .await
            .map_err(|_| BackendError::FeedClosed)?;

        ack.await.map_err(|_| BackendError::FeedClosed)
    }

    /// Release a subscription.  Releasing an unknown or already-released id
    /// is a no-op.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.cmd_tx.send(FeedCommand::Unsubscribe(id)).await;
    }

    /// Deliver `event` to every subscriber of `topic`.
    pub async fn publish(&self, topic: impl Into<String>, event: T) -> Result<(), BackendError> {
        self.cmd_tx
            .send(FeedCommand::Publish {
                topic: topic.into(),
                event,
            })
            .await
            .map_err(|_| BackendError::FeedClosed)
    }

    /// Gracefully stop the hub task.  Outstanding subscriptions see their
    /// event channels close.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(FeedCommand::Shutdown).await;
    }
}

struct Subscriber<T> {
    topic: String,
    tx: mpsc::Sender<T>,
}

/// Spawn the feed hub in a background tokio task and return its handle.
pub fn spawn_feed<T: Clone + Send + 'static>() -> FeedHandle<T> {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<FeedCommand<T>>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut subscribers: HashMap<SubscriptionId, Subscriber<T>> = HashMap::new();
        let mut next_id: u64 = 0;

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                FeedCommand::Subscribe { topic, reply } => {
                    next_id += 1;
                    let id = SubscriptionId(next_id);
                    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

                    debug!(sub = %id, topic = %topic, "Subscription opened");
                    subscribers.insert(id, Subscriber { topic: topic.clone(), tx });

                    let _ = reply.send(Subscription {
                        id,
                        topic,
                        events: rx,
                    });
                }

                FeedCommand::Unsubscribe(id) => {
                    if subscribers.remove(&id).is_some() {
                        debug!(sub = %id, "Subscription released");
                    }
                }

                FeedCommand::Publish { topic, event } => {
                    let mut stale = Vec::new();

                    for (id, sub) in subscribers.iter().filter(|(_, s)| s.topic == topic) {
                        match sub.tx.try_send(event.clone()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                warn!(sub = %id, topic = %topic, "Subscriber queue full, dropping event");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                stale.push(*id);
                            }
                        }
                    }

                    for id in stale {
                        debug!(sub = %id, "Pruning subscriber with dropped receiver");
                        subscribers.remove(&id);
                    }
                }

                FeedCommand::Shutdown => {
                    info!(subscribers = subscribers.len(), "Feed hub shutdown requested");
                    break;
                }
            }
        }

        debug!("Feed hub task terminated");
    });

    FeedHandle { cmd_tx }
}

/// Per-conversation message change feed, as consumed by the sync engine.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription scoped to one chat's insert/update events.
    async fn subscribe_chat(&self, chat_id: ChatId) -> Result<Subscription<FeedEvent>, BackendError>;

    /// Release a previously opened subscription.
    async fn unsubscribe(&self, id: SubscriptionId);
}

#[async_trait]
impl ChangeFeed for FeedHandle<FeedEvent> {
    async fn subscribe_chat(&self, chat_id: ChatId) -> Result<Subscription<FeedEvent>, BackendError> {
        self.subscribe(chat_id.feed_topic()).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        FeedHandle::unsubscribe(self, id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use causerie_shared::{MessageId, MessagePatch};

    #[tokio::test]
    async fn publish_reaches_matching_topic_only() {
        let feed = spawn_feed::<FeedEvent>();
        let chat_a = ChatId::new();
        let chat_b = ChatId::new();

        let mut sub_a = feed.subscribe_chat(chat_a).await.unwrap();
        let mut sub_b = feed.subscribe_chat(chat_b).await.unwrap();

        feed.publish(chat_a.feed_topic(), FeedEvent::Update(MessagePatch::read(MessageId::new())))
            .await
            .unwrap();

        assert!(sub_a.events.recv().await.is_some());
        assert!(sub_b.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let feed = spawn_feed::<FeedEvent>();
        let chat = ChatId::new();

        let sub = feed.subscribe_chat(chat).await.unwrap();
        let id = sub.id;
        let mut events = sub.events;

        ChangeFeed::unsubscribe(&feed, id).await;
        feed.publish(chat.feed_topic(), FeedEvent::Update(MessagePatch::read(MessageId::new())))
            .await
            .unwrap();

        // The channel closes once the hub drops its sender.
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_without_error() {
        let feed = spawn_feed::<FeedEvent>();
        let chat = ChatId::new();

        let sub = feed.subscribe_chat(chat).await.unwrap();
        drop(sub);

        // Both publishes succeed; the second runs against a pruned map.
        for _ in 0..2 {
            feed.publish(chat.feed_topic(), FeedEvent::Update(MessagePatch::read(MessageId::new())))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions() {
        let feed = spawn_feed::<FeedEvent>();
        let mut sub = feed.subscribe_chat(ChatId::new()).await.unwrap();

        feed.shutdown().await;

        assert!(sub.events.recv().await.is_none());
    }
}
