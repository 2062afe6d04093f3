//! # causerie-feed
//!
//! The change-notification channel: a topic-keyed publish/subscribe hub
//! running in a dedicated tokio task, driven by a typed command channel.
//!
//! Delivery to subscribers is best-effort.  A subscriber whose queue is
//! full loses that event; a subscriber whose receiver was dropped is
//! pruned.  Consumers are expected to deduplicate by id, so at-least-once
//! delivery is acceptable.

pub mod hub;

pub use hub::{spawn_feed, ChangeFeed, FeedHandle, Subscription, SubscriptionId};

/// Topic carrying [`causerie_shared::ChatPatch`] events for the
/// conversation list.
pub const CHATS_TOPIC: &str = "chats";
