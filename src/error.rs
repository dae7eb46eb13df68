//! Error types for conversation state operations

use crate::platform::PlatformError;
use thiserror::Error;

/// Errors raised by `Convo` and the layers built on it.
///
/// Argument, state and range errors are returned synchronously by the call that
/// violates the precondition; they never surface later from a flush.
#[derive(Debug, Error)]
pub enum ConvoError {
    /// A required argument was missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation needs a list, selection or turn that does not exist
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// A paging window or selection index is outside the list bounds
    #[error("Out of range: {0}")]
    Range(String),
    /// A responder call failed during flush
    #[error("Platform call failed: {0}")]
    Platform(#[from] PlatformError),
    /// Context or storage data could not be (de)serialized
    #[error("Malformed data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvoError {
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::Range(message.into())
    }
}

pub type ConvoResult<T> = Result<T, ConvoError>;
