//! Error types for sous-chat

use thiserror::Error;

/// Result type alias using sous-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the session controller
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client layer
    #[error(transparent)]
    Api(#[from] sous_ai::Error),

    /// An exchange is already in flight
    #[error("An answer is still streaming; wait for it to finish")]
    Busy,

    /// Nothing to send
    #[error("Cannot send an empty question")]
    EmptyQuery,

    /// The controller has been shut down
    #[error("The chat session is closed")]
    Closed,
}

impl Error {
    /// Whether this is a single-flight rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
    }
}
