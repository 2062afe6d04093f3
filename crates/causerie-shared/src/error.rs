use thiserror::Error;

/// Errors surfaced by the backend collaborators (message store, profile
/// directory, change feed).  Each request fails or succeeds atomically;
/// none of these is retried automatically.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The requested record does not exist.
    #[error("record not found")]
    NotFound,

    /// The backend could not be reached or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the request but failed to execute it.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The change-feed hub has shut down.
    #[error("change feed closed")]
    FeedClosed,
}
