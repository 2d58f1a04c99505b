//! Client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("a query is already in flight for session {0}")]
    QueryInFlight(String),

    #[error("a search is in progress")]
    SearchInProgress,

    #[error("session {0} not found")]
    UnknownSession(String),

    #[error("the last remaining session cannot be deleted")]
    LastSession,

    #[error("no failed turn to retry in session {0}")]
    NothingToRetry(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("preferences file is invalid: {0}")]
    Prefs(String),
}
