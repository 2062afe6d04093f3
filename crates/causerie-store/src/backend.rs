//! Backend interfaces consumed by the synchronization engine, and the
//! local adapter implementing them.
//!
//! The engine only ever talks to these traits; a hosted deployment would
//! implement them against its API, while [`LocalBackend`] implements them
//! against the embedded [`Database`] and publishes a change-feed event for
//! every insert and update it performs, so the feed mirrors what a hosted
//! backend's row-level notifications would deliver.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use causerie_feed::FeedHandle;
use causerie_shared::{
    BackendError, ChatId, ChatPatch, ChatSummary, FeedEvent, Message, MessageId, MessagePatch,
    MessageRecord, NewMessage, SenderProfile, UserId,
};

use crate::database::Database;

/// The durable message table: ordered reads, inserts, and read-flag
/// updates, each succeeding or failing atomically.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Full ordered read of one chat's messages, ascending by
    /// `(created_at, id)`, with sender profiles attached.
    async fn messages_ordered(&self, chat_id: ChatId) -> Result<Vec<Message>, BackendError>;

    /// Insert a message.  The store assigns the id and returns the stored
    /// row.
    async fn insert_message(&self, draft: NewMessage) -> Result<MessageRecord, BackendError>;

    /// Flip the read flag on every listed message in a single request.
    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), BackendError>;
}

/// Sender profile lookup, used to hydrate feed insert events.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile(&self, user_id: UserId) -> Result<SenderProfile, BackendError>;
}

/// The chat directory backing the conversation list.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// All chats, newest activity first.
    async fn chats_by_recency(&self) -> Result<Vec<ChatSummary>, BackendError>;

    /// One chat with members and labels.
    async fn chat(&self, chat_id: ChatId) -> Result<ChatSummary, BackendError>;
}

/// Embedded backend: the SQLite database plus the feed hubs its writes
/// notify.
pub struct LocalBackend {
    db: Mutex<Database>,
    message_feed: FeedHandle<FeedEvent>,
    chat_feed: Option<FeedHandle<ChatPatch>>,
}

impl LocalBackend {
    pub fn new(db: Database, message_feed: FeedHandle<FeedEvent>) -> Self {
        Self {
            db: Mutex::new(db),
            message_feed,
            chat_feed: None,
        }
    }

    /// Also publish chat-row patches (last-message previews) on the
    /// `chats` topic.
    pub fn with_chat_feed(mut self, feed: FeedHandle<ChatPatch>) -> Self {
        self.chat_feed = Some(feed);
        self
    }

    /// Direct access to the database, for seeding and maintenance.
    pub async fn database(&self) -> tokio::sync::MutexGuard<'_, Database> {
        self.db.lock().await
    }

    async fn publish_event(&self, chat_id: ChatId, event: FeedEvent) {
        if let Err(e) = self.message_feed.publish(chat_id.feed_topic(), event).await {
            warn!(chat = %chat_id, error = %e, "Failed to publish feed event");
        }
    }
}

#[async_trait]
impl MessageStore for LocalBackend {
    async fn messages_ordered(&self, chat_id: ChatId) -> Result<Vec<Message>, BackendError> {
        let db = self.db.lock().await;
        Ok(db.messages_for_chat(chat_id)?)
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<MessageRecord, BackendError> {
        let record = MessageRecord {
            id: MessageId::new(),
            chat_id: draft.chat_id,
            sender_id: draft.sender_id,
            content: draft.content,
            created_at: draft.created_at,
            is_read: draft.is_read,
        };

        {
            let db = self.db.lock().await;
            db.insert_message(&record)?;

            if !db.touch_last_message(record.chat_id, &record.content, record.created_at)? {
                debug!(chat = %record.chat_id, "No chat row to refresh for inserted message");
            }
        }

        self.publish_event(record.chat_id, FeedEvent::Insert(record.clone()))
            .await;

        if let Some(ref chat_feed) = self.chat_feed {
            let patch = ChatPatch {
                id: record.chat_id,
                title: None,
                last_message: Some(record.content.clone()),
                last_message_at: Some(record.created_at),
            };
            if let Err(e) = chat_feed.publish(causerie_feed::CHATS_TOPIC, patch).await {
                warn!(chat = %record.chat_id, error = %e, "Failed to publish chat patch");
            }
        }

        Ok(record)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), BackendError> {
        if ids.is_empty() {
            return Ok(());
        }

        // Resolve each id to its chat before the update so the patches can
        // be routed to the right topics afterwards.
        let mut routed = Vec::with_capacity(ids.len());
        {
            let db = self.db.lock().await;
            for &id in ids {
                match db.get_message(id) {
                    Ok(record) => routed.push((record.chat_id, id)),
                    Err(crate::StoreError::NotFound) => {
                        debug!(message = %id, "Skipping read flag for unknown message");
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            db.mark_read(ids)?;
        }

        for (chat_id, id) in routed {
            self.publish_event(chat_id, FeedEvent::Update(MessagePatch::read(id)))
                .await;
        }

        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for LocalBackend {
    async fn profile(&self, user_id: UserId) -> Result<SenderProfile, BackendError> {
        let db = self.db.lock().await;
        Ok(db.get_user(user_id)?.profile)
    }
}

#[async_trait]
impl ChatDirectory for LocalBackend {
    async fn chats_by_recency(&self) -> Result<Vec<ChatSummary>, BackendError> {
        let db = self.db.lock().await;
        Ok(db.list_chats()?)
    }

    async fn chat(&self, chat_id: ChatId) -> Result<ChatSummary, BackendError> {
        let db = self.db.lock().await;
        Ok(db.get_chat(chat_id)?)
    }
}
