//! Conversation-list synchronization.
//!
//! The list pane's counterpart to [`crate::sync::ChatSync`]: an ordered
//! set of chat summaries kept current by merging `ChatPatch` update events
//! from the `chats` topic.  Inserts are not delivered for chats; a new
//! conversation appears on the next [`ChatListSync::refresh`].

use std::cmp::Reverse;
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use causerie_feed::{FeedHandle, Subscription, CHATS_TOPIC};
use causerie_shared::{ChatId, ChatPatch, ChatSummary};
use causerie_store::ChatDirectory;

use crate::error::SyncError;

/// Synchronizer for the conversation list.
pub struct ChatListSync {
    directory: Arc<dyn ChatDirectory>,
    feed: FeedHandle<ChatPatch>,
    chats: Vec<ChatSummary>,
    subscription: Option<Subscription<ChatPatch>>,
}

impl ChatListSync {
    pub fn new(directory: Arc<dyn ChatDirectory>, feed: FeedHandle<ChatPatch>) -> Self {
        Self {
            directory,
            feed,
            chats: Vec::new(),
            subscription: None,
        }
    }

    /// Subscribe to chat updates and load the list.  The subscription is
    /// opened before the read, so updates racing the fetch buffer rather
    /// than vanish.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if self.subscription.is_none() {
            let subscription = self
                .feed
                .subscribe(CHATS_TOPIC)
                .await
                .map_err(SyncError::Subscribe)?;
            self.subscription = Some(subscription);
        }

        self.refresh().await
    }

    /// Reload the full list from the directory, newest activity first.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        self.chats = self
            .directory
            .chats_by_recency()
            .await
            .map_err(SyncError::Fetch)?;
        info!(chats = self.chats.len(), "Conversation list refreshed");
        Ok(())
    }

    /// One chat with members and labels, for a detail header.
    pub async fn chat(&self, chat_id: ChatId) -> Result<ChatSummary, SyncError> {
        self.directory.chat(chat_id).await.map_err(SyncError::Fetch)
    }

    /// Merge an update event into the matching summary.  Unknown ids are
    /// ignored; the list is re-sorted so recency order holds between
    /// refreshes.
    pub fn apply_patch(&mut self, patch: ChatPatch) {
        let Some(chat) = self.chats.iter_mut().find(|c| c.id == patch.id) else {
            debug!(chat = %patch.id, "Ignoring patch for unknown chat");
            return;
        };

        if let Some(title) = patch.title {
            chat.title = title;
        }
        if let Some(last_message) = patch.last_message {
            chat.last_message = Some(last_message);
        }
        if let Some(last_message_at) = patch.last_message_at {
            chat.last_message_at = Some(last_message_at);
        }

        self.chats
            .sort_by_key(|c| (c.last_message_at.is_none(), Reverse(c.last_message_at)));
    }

    /// Drain buffered update events without blocking.  Returns the number
    /// applied.
    pub async fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let patch = match self.subscription.as_mut() {
                Some(sub) => match sub.events.try_recv() {
                    Ok(patch) => patch,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                },
                None => break,
            };
            self.apply_patch(patch);
            applied += 1;
        }
        applied
    }

    /// Await the next update event and apply it.  Returns `false` when no
    /// subscription is held or the feed has closed.
    pub async fn tick(&mut self) -> bool {
        let patch = match self.subscription.as_mut() {
            Some(sub) => match sub.events.recv().await {
                Some(patch) => patch,
                None => return false,
            },
            None => return false,
        };
        self.apply_patch(patch);
        true
    }

    /// Release the subscription and clear the list.  Safe to call
    /// repeatedly.
    pub async fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(sub = %subscription.id, "Releasing chat list subscription");
            self.feed.unsubscribe(subscription.id).await;
        }
        self.chats.clear();
    }

    /// Current summaries, newest activity first.
    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }
}
