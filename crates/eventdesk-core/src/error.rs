//! Error types for the EventDesk client core.
//!
//! Authentication failures collapse the session to unauthenticated; every
//! other variant stays local to the action that raised it.

use thiserror::Error;

/// Client-level errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The credential could not be decoded.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential's expiry is in the past.
    #[error("Credential expired")]
    Expired,

    /// Request failed, either in transport or with a non-success status.
    #[error("{message}")]
    Network {
        /// HTTP status when the server answered.
        status: Option<u16>,
        /// Server-supplied message, or a generic one.
        message: String,
    },

    /// Required form fields are missing or inconsistent.
    #[error("{0}")]
    Validation(String),

    /// An RSVP for this event is already in flight.
    #[error("RSVP already pending for event {0}")]
    RsvpPending(i64),

    /// The event is not tracked by the RSVP board.
    #[error("Unknown event: {0}")]
    UnknownEvent(i64),

    /// Session storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using the client error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Network failure without a server answer.
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            status: None,
            message: message.into(),
        }
    }

    /// True for errors that must drop the session to unauthenticated.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::MalformedCredential(_) | Error::Expired)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
