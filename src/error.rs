//! Error types for fail-over coordination.

use crate::types::Endpoint;
use thiserror::Error;

/// Main error type for coordinator operations.
#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference list is empty")]
    EmptyPreferenceList,

    #[error("Server listed more than once: {0}")]
    DuplicateServer(Endpoint),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to connect to {server}: {reason}")]
    Connect { server: Endpoint, reason: String },

    #[error("Failed to subscribe to {server}: {reason}")]
    Subscribe { server: Endpoint, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coordinator has been shut down")]
    ShutDown,
}

impl From<serde_json::Error> for FailoverError {
    fn from(e: serde_json::Error) -> Self {
        FailoverError::Config(e.to_string())
    }
}

/// Why a change feed ended or could not be opened.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("feed closed")]
    Closed,
}

impl FeedError {
    pub(crate) fn into_subscribe(self, server: &Endpoint) -> FailoverError {
        FailoverError::Subscribe {
            server: server.clone(),
            reason: self.to_string(),
        }
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, FailoverError>;
