//! # causerie-shared
//!
//! Domain types shared by every Causerie crate: id newtypes, the message
//! and chat models, the change-feed payloads, and the backend error
//! vocabulary.
//!
//! Everything here is plain data.  Storage lives in `causerie-store`, the
//! change feed in `causerie-feed`, and the synchronization engine in
//! `causerie-client`.

pub mod models;
pub mod types;

mod error;

pub use error::BackendError;
pub use models::*;
pub use types::{ChatId, ChatKind, MessageId, UserId};
