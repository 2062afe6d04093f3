//! Domain model structs exchanged between the store, the change feed, and
//! the synchronization engine.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a presentation layer over IPC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, ChatKind, MessageId, UserId};

// ---------------------------------------------------------------------------
// Sender profile
// ---------------------------------------------------------------------------

/// Denormalized sender details attached to a displayable message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SenderProfile {
    pub name: String,
    pub phone: String,
    pub avatar_url: String,
}

/// A user directory row backing profile lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub profile: SenderProfile,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A fully hydrated message: the stored row plus the sender profile.
///
/// Within a chat, messages are totally ordered by `(created_at, id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub sender: SenderProfile,
}

impl Message {
    /// Total-order key: creation timestamp, ties broken by id.
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }

    pub fn from_record(record: MessageRecord, sender: SenderProfile) -> Self {
        Self {
            id: record.id,
            chat_id: record.chat_id,
            sender_id: record.sender_id,
            content: record.content,
            created_at: record.created_at,
            is_read: record.is_read,
            sender,
        }
    }
}

/// The row-level message shape: what the store persists and what insert
/// events on the change feed carry.  No sender profile -- consumers must
/// hydrate it themselves before display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageRecord {
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}

/// Insert input.  The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Update-event payload: an id plus the changed fields only.  Absent fields
/// are left untouched on merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePatch {
    pub id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

impl MessagePatch {
    /// Patch flipping the read flag to true (the only remote mutation in
    /// scope).
    pub fn read(id: MessageId) -> Self {
        Self {
            id,
            is_read: Some(true),
        }
    }
}

// ---------------------------------------------------------------------------
// Change-feed payload
// ---------------------------------------------------------------------------

/// Row-level notification delivered on a chat's message topic.
///
/// Delivery is at-least-once and unordered relative to the initial read;
/// consumers must deduplicate by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    Insert(MessageRecord),
    Update(MessagePatch),
}

impl FeedEvent {
    /// Serialize to the JSON shape the hosted feed delivers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a raw feed payload.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

/// The bare chat row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: ChatId,
    pub title: String,
    pub kind: ChatKind,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A chat member joined with the member's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMember {
    pub user_id: UserId,
    pub profile: SenderProfile,
}

/// A label attached to a chat in the conversation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatLabel {
    pub name: String,
    pub color: String,
}

/// A chat row joined with its members and labels -- the conversation-list
/// entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub title: String,
    pub kind: ChatKind,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub labels: Vec<ChatLabel>,
    pub members: Vec<ChatMember>,
    pub created_at: DateTime<Utc>,
}

impl ChatSummary {
    /// The member shown for a direct chat: the first member who is not the
    /// viewer.
    pub fn counterpart(&self, viewer: UserId) -> Option<&ChatMember> {
        self.members
            .iter()
            .find(|m| m.user_id != viewer)
            .or_else(|| self.members.first())
    }
}

/// Update-event payload on the `chats` topic: an id plus changed fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatPatch {
    pub id: ChatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(),
            chat_id: ChatId::new(),
            sender_id: UserId::new(),
            content: "salut".to_string(),
            created_at: ts.parse().unwrap(),
            is_read: false,
        }
    }

    #[test]
    fn feed_event_json_round_trip() {
        let event = FeedEvent::Insert(record("2025-03-01T10:00:00Z"));

        let json = event.to_json().unwrap();
        let restored = FeedEvent::from_json(&json).unwrap();

        assert_eq!(event, restored);
    }

    #[test]
    fn patch_omits_absent_fields() {
        let patch = MessagePatch {
            id: MessageId::new(),
            is_read: None,
        };
        let json = serde_json::to_string(&FeedEvent::Update(patch)).unwrap();
        assert!(!json.contains("is_read"));

        let read = MessagePatch::read(MessageId::new());
        let json = serde_json::to_string(&FeedEvent::Update(read)).unwrap();
        assert!(json.contains("\"is_read\":true"));
    }

    #[test]
    fn counterpart_prefers_the_non_viewer_member() {
        let viewer = UserId::new();
        let friend = UserId::new();
        let member = |id: UserId, name: &str| ChatMember {
            user_id: id,
            profile: SenderProfile {
                name: name.to_string(),
                phone: String::new(),
                avatar_url: String::new(),
            },
        };

        let mut chat = ChatSummary {
            id: ChatId::new(),
            title: "duo".to_string(),
            kind: ChatKind::Direct,
            last_message: None,
            last_message_at: None,
            labels: Vec::new(),
            members: vec![member(viewer, "moi"), member(friend, "toi")],
            created_at: "2025-03-01T10:00:00Z".parse().unwrap(),
        };

        assert_eq!(chat.counterpart(viewer).unwrap().user_id, friend);

        // A viewer-only chat falls back to the first member.
        chat.members = vec![member(viewer, "moi")];
        assert_eq!(chat.counterpart(viewer).unwrap().user_id, viewer);
    }

    #[test]
    fn sort_key_breaks_ties_by_id() {
        let a = record("2025-03-01T10:00:00Z");
        let mut b = record("2025-03-01T10:00:00Z");
        b.chat_id = a.chat_id;

        assert_ne!(a.sort_key(), b.sort_key());
        assert_eq!(a.sort_key() < b.sort_key(), a.id < b.id);
    }
}
