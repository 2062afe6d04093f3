//! Render-ready view of a conversation.
//!
//! Built from the engine's ordered in-memory set; pure and side-effect
//! free.  Messages are tagged with their direction relative to the viewer
//! and grouped into calendar-day sections, the way a conversation pane
//! renders them.

use chrono::NaiveDate;
use serde::Serialize;

use causerie_shared::{ChatId, Message, UserId};

/// Whether a message was sent by the viewer or received from someone else.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// One message plus its viewer-relative classification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ViewMessage {
    pub direction: Direction,
    pub message: Message,
}

/// All messages sharing one calendar date (UTC date of `created_at`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DaySection {
    pub date: NaiveDate,
    pub messages: Vec<ViewMessage>,
}

/// Snapshot of one conversation, ordered and grouped for rendering.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatView {
    pub chat_id: Option<ChatId>,
    pub viewer: Option<UserId>,
    pub days: Vec<DaySection>,
}

impl ChatView {
    pub(crate) fn build(
        chat_id: Option<ChatId>,
        viewer: Option<UserId>,
        messages: &[Message],
    ) -> Self {
        let mut days: Vec<DaySection> = Vec::new();

        for message in messages {
            let direction = if Some(message.sender_id) == viewer {
                Direction::Outgoing
            } else {
                Direction::Incoming
            };
            let entry = ViewMessage {
                direction,
                message: message.clone(),
            };

            // Input is sorted, so each date forms one contiguous run.
            let date = message.created_at.date_naive();
            if days.last().map_or(true, |section| section.date != date) {
                days.push(DaySection {
                    date,
                    messages: Vec::new(),
                });
            }
            if let Some(section) = days.last_mut() {
                section.messages.push(entry);
            }
        }

        Self {
            chat_id,
            viewer,
            days,
        }
    }

    /// All messages in order, across day sections.
    pub fn messages(&self) -> impl Iterator<Item = &ViewMessage> {
        self.days.iter().flat_map(|d| d.messages.iter())
    }

    pub fn len(&self) -> usize {
        self.days.iter().map(|d| d.messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
