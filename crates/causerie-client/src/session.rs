//! Viewer identity.
//!
//! The synchronizers never talk to an authentication service themselves;
//! they read the current identity from an [`IdentityProvider`] handed in at
//! construction.  [`Session`] is the in-process implementation, backed by a
//! watch channel so interested parties can react to sign-in / sign-out.

use tokio::sync::watch;
use tracing::info;

use causerie_shared::UserId;

/// Source of the authenticated viewer's identity.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` while signed out / still resolving.
    fn current_user(&self) -> Option<UserId>;

    /// A receiver that yields on every sign-in / sign-out transition.
    fn watch(&self) -> watch::Receiver<Option<UserId>>;
}

/// In-process session state.
pub struct Session {
    current: watch::Sender<Option<UserId>>,
}

impl Session {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// A session already signed in as `user`.  Convenient for tests and
    /// single-user embeddings.
    pub fn signed_in(user: UserId) -> Self {
        let session = Self::new();
        session.sign_in(user);
        session
    }

    pub fn sign_in(&self, user: UserId) {
        info!(user = %user.short(), "Signed in");
        self.current.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        info!("Signed out");
        self.current.send_replace(None);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for Session {
    fn current_user(&self) -> Option<UserId> {
        *self.current.borrow()
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.current.subscribe()
    }
}
