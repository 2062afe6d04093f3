use thiserror::Error;

use causerie_shared::BackendError;

/// Failures surfaced by the synchronizers.
///
/// None of these is fatal to the engine: a `Fetch` leaves the conversation
/// deselected and retryable, a `Write` on a send leaves the caller's draft
/// intact, and read-flag or lookup failures are handled internally by
/// logging and moving on.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The initial ordered read failed.
    #[error("initial fetch failed: {0}")]
    Fetch(#[source] BackendError),

    /// Opening the change-feed subscription failed.
    #[error("feed subscription failed: {0}")]
    Subscribe(#[source] BackendError),

    /// A sender profile lookup failed; the offending event is dropped.
    #[error("sender profile lookup failed: {0}")]
    Lookup(#[source] BackendError),

    /// An insert or read-flag write failed.
    #[error("store write failed: {0}")]
    Write(#[source] BackendError),

    /// No resolved viewer identity.
    #[error("no resolved viewer identity")]
    NoIdentity,

    /// No conversation is selected.
    #[error("no active conversation")]
    NoConversation,
}
