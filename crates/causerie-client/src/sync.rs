//! Conversation synchronization and read-state reconciliation.
//!
//! [`ChatSync`] owns the authoritative in-memory view of one
//! conversation's messages.  It merges the initial historical fetch with
//! the live insert/update events of the change feed, deduplicates and
//! orders them, and writes read-flag transitions back to the store.
//!
//! Everything runs on one logical thread of control: every mutation goes
//! through `&mut self`, so event handling never races the fetch -- the
//! only hazard is *arrival order*, which the merge logic is defensive
//! about.  Events may reach the subscription queue at any time after
//! subscribe; [`ChatSync::pump`] and [`ChatSync::tick`] are the only
//! paths draining it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use causerie_feed::{ChangeFeed, Subscription};
use causerie_shared::{
    ChatId, FeedEvent, Message, MessageId, MessagePatch, MessageRecord, NewMessage, UserId,
};
use causerie_store::{MessageStore, ProfileDirectory};

use crate::error::SyncError;
use crate::session::IdentityProvider;
use crate::view::ChatView;

/// Lifecycle of one conversation selection.
///
/// `Loading` covers the initial read and its read-flag batch; `Live` holds
/// from then until teardown.  Events are accepted in both -- they buffer
/// in the subscription queue until drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Live,
}

/// Synchronization engine for a single active conversation.
pub struct ChatSync {
    store: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileDirectory>,
    feed: Arc<dyn ChangeFeed>,
    identity: Arc<dyn IdentityProvider>,

    state: SyncState,
    chat_id: Option<ChatId>,
    viewer: Option<UserId>,

    /// Sorted ascending by `(created_at, id)`.
    messages: Vec<Message>,
    /// Ids already present, for duplicate-event suppression.
    known: HashSet<MessageId>,
    subscription: Option<Subscription<FeedEvent>>,
}

impl ChatSync {
    pub fn new(
        store: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileDirectory>,
        feed: Arc<dyn ChangeFeed>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            profiles,
            feed,
            identity,
            state: SyncState::Idle,
            chat_id: None,
            viewer: None,
            messages: Vec::new(),
            known: HashSet::new(),
            subscription: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.chat_id
    }

    /// Select `chat_id`: full ordered read, read-flag reconciliation, live
    /// subscription.
    ///
    /// Any prior selection is torn down first -- a conversation switch is a
    /// hard reset, never a merge.  On failure the engine is back in `Idle`
    /// with an empty snapshot and the call may simply be retried.
    pub async fn initialize(&mut self, chat_id: ChatId) -> Result<(), SyncError> {
        let viewer = self.identity.current_user().ok_or(SyncError::NoIdentity)?;

        self.teardown().await;

        self.chat_id = Some(chat_id);
        self.viewer = Some(viewer);
        self.state = SyncState::Loading;

        // Subscribe before the read: events racing the fetch buffer in the
        // subscription queue instead of being lost.
        match self.feed.subscribe_chat(chat_id).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                warn!(chat = %chat_id, error = %e, "Feed subscription failed");
                self.reset();
                return Err(SyncError::Subscribe(e));
            }
        }

        let mut fetched = match self.store.messages_ordered(chat_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(chat = %chat_id, error = %e, "Initial fetch failed");
                self.teardown().await;
                return Err(SyncError::Fetch(e));
            }
        };
        fetched.sort_by_key(Message::sort_key);

        self.known = fetched.iter().map(|m| m.id).collect();
        self.messages = fetched;

        self.reconcile_fetched(chat_id, viewer).await;

        self.state = SyncState::Live;
        info!(chat = %chat_id, messages = self.messages.len(), "Conversation live");
        Ok(())
    }

    /// One batched read-flag update for every fetched message someone else
    /// sent that the viewer has not read.  Best-effort: a failure is
    /// logged and left for a later reconciliation, it never blocks
    /// display.
    async fn reconcile_fetched(&mut self, chat_id: ChatId, viewer: UserId) {
        let unread: Vec<MessageId> = self
            .messages
            .iter()
            .filter(|m| !m.is_read && m.sender_id != viewer)
            .map(|m| m.id)
            .collect();

        if unread.is_empty() {
            return;
        }

        match self.store.mark_read(&unread).await {
            Ok(()) => {
                for message in self
                    .messages
                    .iter_mut()
                    .filter(|m| !m.is_read && m.sender_id != viewer)
                {
                    message.is_read = true;
                }
                debug!(chat = %chat_id, count = unread.len(), "Read flags reconciled");
            }
            Err(e) => {
                warn!(chat = %chat_id, count = unread.len(), error = %e, "Read flag batch failed");
            }
        }
    }

    /// Apply one feed event against the in-memory set.
    ///
    /// Tolerates anything the feed can throw at it: duplicates, stale
    /// events for a torn-down or different conversation, updates for
    /// messages never loaded, arrival before the initial read has been
    /// merged.
    pub async fn apply_event(&mut self, event: FeedEvent) {
        let (Some(chat_id), Some(viewer)) = (self.chat_id, self.viewer) else {
            debug!("Dropping feed event: no active conversation");
            return;
        };

        match event {
            FeedEvent::Insert(record) => {
                if let Err(e) = self.apply_insert(chat_id, viewer, record).await {
                    warn!(chat = %chat_id, error = %e, "Dropped insert event");
                }
            }
            FeedEvent::Update(patch) => self.apply_update(patch),
        }
    }

    async fn apply_insert(
        &mut self,
        chat_id: ChatId,
        viewer: UserId,
        mut record: MessageRecord,
    ) -> Result<(), SyncError> {
        if record.chat_id != chat_id {
            debug!(message = %record.id, other = %record.chat_id, "Ignoring insert for another conversation");
            return Ok(());
        }
        if self.known.contains(&record.id) {
            debug!(message = %record.id, "Ignoring duplicate insert");
            return Ok(());
        }

        // The event carries only row fields; the sender must be resolved
        // before the message is displayable.
        let sender = self
            .profiles
            .profile(record.sender_id)
            .await
            .map_err(SyncError::Lookup)?;

        if record.sender_id != viewer && !record.is_read {
            match self.store.mark_read(&[record.id]).await {
                Ok(()) => record.is_read = true,
                Err(e) => {
                    // Left unread locally; the next full reconciliation
                    // catches it.
                    warn!(message = %record.id, error = %e, "Read flag update failed");
                }
            }
        }

        let message = Message::from_record(record, sender);
        let at = self
            .messages
            .partition_point(|m| m.sort_key() < message.sort_key());
        debug!(message = %message.id, position = at, "Merged insert event");
        self.known.insert(message.id);
        self.messages.insert(at, message);
        Ok(())
    }

    fn apply_update(&mut self, patch: MessagePatch) {
        let Some(existing) = self.messages.iter_mut().find(|m| m.id == patch.id) else {
            debug!(message = %patch.id, "Ignoring update for unknown message");
            return;
        };

        if let Some(is_read) = patch.is_read {
            existing.is_read = is_read;
        }
    }

    /// Drain every buffered subscription event without blocking.  Returns
    /// the number applied.
    pub async fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let event = match self.subscription.as_mut() {
                Some(sub) => match sub.events.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Feed subscription closed");
                        break;
                    }
                },
                None => break,
            };
            self.apply_event(event).await;
            applied += 1;
        }
        applied
    }

    /// Await the next subscription event and apply it.  Returns `false`
    /// when no subscription is held or the feed has closed.
    ///
    /// Cancellation-safe, so it can sit in a `select!` loop.
    pub async fn tick(&mut self) -> bool {
        let event = match self.subscription.as_mut() {
            Some(sub) => match sub.events.recv().await {
                Some(event) => event,
                None => {
                    debug!("Feed subscription closed");
                    return false;
                }
            },
            None => return false,
        };
        self.apply_event(event).await;
        true
    }

    /// Store a new message from the viewer.
    ///
    /// Whitespace-only text is a no-op.  The stored record is *not*
    /// rendered locally -- it becomes visible when its own insert event
    /// returns through the feed, so the snapshot never shows anything the
    /// store has not confirmed.  On failure the caller keeps the draft and
    /// may retry.
    pub async fn send_message(&mut self, text: &str) -> Result<(), SyncError> {
        let viewer = self.identity.current_user().ok_or(SyncError::NoIdentity)?;
        let chat_id = self.chat_id.ok_or(SyncError::NoConversation)?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let draft = NewMessage {
            chat_id,
            sender_id: viewer,
            content: trimmed.to_string(),
            created_at: Utc::now(),
            is_read: false,
        };

        let record = self.store.insert_message(draft).await.map_err(|e| {
            warn!(chat = %chat_id, error = %e, "Send failed");
            SyncError::Write(e)
        })?;

        debug!(message = %record.id, chat = %chat_id, "Message stored");
        Ok(())
    }

    /// Release the subscription and drop all conversation state.  Safe to
    /// call repeatedly; called internally before every re-initialize.
    pub async fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(sub = %subscription.id, "Releasing feed subscription");
            self.feed.unsubscribe(subscription.id).await;
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SyncState::Idle;
        self.chat_id = None;
        self.viewer = None;
        self.messages.clear();
        self.known.clear();
    }

    /// Current render-ready view.  Pure; empty before a selection has
    /// loaded anything.
    pub fn snapshot(&self) -> ChatView {
        ChatView::build(self.chat_id, self.viewer, &self.messages)
    }
}
