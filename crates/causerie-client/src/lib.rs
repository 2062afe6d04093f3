//! # causerie-client
//!
//! The client core: the conversation synchronization engine, the
//! conversation-list synchronizer, the render-ready view model, the
//! identity session, and the composition root wiring them to the store
//! and change feed.
//!
//! Presentation is someone else's problem.  A UI layer drives
//! [`ChatSync`] / [`ChatListSync`] with user intents and renders whatever
//! [`ChatSync::snapshot`] returns; nothing in this crate draws anything.

pub mod app;
pub mod chat_list;
pub mod config;
pub mod session;
pub mod sync;
pub mod view;

mod error;

pub use app::App;
pub use chat_list::ChatListSync;
pub use config::{init_tracing, ClientConfig};
pub use error::SyncError;
pub use session::{IdentityProvider, Session};
pub use sync::{ChatSync, SyncState};
pub use view::{ChatView, DaySection, Direction, ViewMessage};
