//! # causerie-store
//!
//! Durable storage for chats, messages, and user profiles, plus the
//! backend interfaces the synchronization engine consumes.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` with typed CRUD helpers for every table, and a
//! [`LocalBackend`] adapter that implements the async [`MessageStore`],
//! [`ProfileDirectory`], and [`ChatDirectory`] traits on top of it,
//! publishing a change-feed event for every insert and update it performs.

pub mod backend;
pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod users;

mod error;

pub use backend::{ChatDirectory, LocalBackend, MessageStore, ProfileDirectory};
pub use database::Database;
pub use error::StoreError;
