//! Composition root.
//!
//! [`App`] owns everything the synchronizers share: the database-backed
//! backend, the two feed hubs, and the identity session.  A presentation
//! layer opens one `App`, signs the session in, and drives as many
//! [`ChatSync`] / [`ChatListSync`] instances as it needs.

use std::sync::Arc;

use tracing::info;

use causerie_feed::{spawn_feed, FeedHandle};
use causerie_shared::{ChatPatch, FeedEvent};
use causerie_store::{Database, LocalBackend};

use crate::chat_list::ChatListSync;
use crate::config::ClientConfig;
use crate::session::Session;
use crate::sync::ChatSync;

pub struct App {
    backend: Arc<LocalBackend>,
    session: Arc<Session>,
    message_feed: FeedHandle<FeedEvent>,
    chat_feed: FeedHandle<ChatPatch>,
}

impl App {
    /// Open the database, spawn the feed hubs, and wire the backend.
    pub async fn open(config: &ClientConfig) -> anyhow::Result<Self> {
        // 1. Database
        let db = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Database::open_at(&dir.join("causerie.db"))?
            }
            None => Database::new()?,
        };

        // 2. Change feeds
        let message_feed = spawn_feed::<FeedEvent>();
        let chat_feed = spawn_feed::<ChatPatch>();

        // 3. Backend and session
        let backend = Arc::new(
            LocalBackend::new(db, message_feed.clone()).with_chat_feed(chat_feed.clone()),
        );
        let session = Arc::new(Session::new());

        info!("Client core ready");

        Ok(Self {
            backend,
            session,
            message_feed,
            chat_feed,
        })
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    pub fn backend(&self) -> Arc<LocalBackend> {
        self.backend.clone()
    }

    /// A conversation synchronizer sharing this app's backend, feed, and
    /// session.
    pub fn chat_sync(&self) -> ChatSync {
        ChatSync::new(
            self.backend.clone(),
            self.backend.clone(),
            Arc::new(self.message_feed.clone()),
            self.session.clone(),
        )
    }

    /// A conversation-list synchronizer sharing this app's backend and
    /// chat feed.
    pub fn chat_list(&self) -> ChatListSync {
        ChatListSync::new(self.backend.clone(), self.chat_feed.clone())
    }

    /// Stop both feed hubs.  Outstanding subscriptions see their channels
    /// close.
    pub async fn shutdown(&self) {
        self.message_feed.shutdown().await;
        self.chat_feed.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IdentityProvider;

    #[tokio::test]
    async fn open_creates_database_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..ClientConfig::default()
        };

        let app = App::open(&config).await.unwrap();
        assert!(dir.path().join("causerie.db").exists());

        assert_eq!(app.session().current_user(), None);
        app.shutdown().await;
    }
}
