//! Error types for the operation log codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding, or replaying a log.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An empty key path was passed where a non-root location is required.
    #[error("key path cannot be empty")]
    InvalidKey,

    /// A value of a kind that cannot be a table root was passed as one.
    #[error("a value of type {kind} cannot be a table root; use an object or an array")]
    UnsupportedRoot {
        /// Kind name of the offending value.
        kind: &'static str,
    },

    /// A log line could not be parsed.
    #[error("malformed log line at byte {position}: {message}")]
    Parse {
        /// Byte offset within the line where parsing failed.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// An operation could not be executed against the current root.
    #[error("cannot replay operation: {message}")]
    Replay {
        /// Description of the problem.
        message: String,
    },
}

impl CodecError {
    /// Creates a parse error.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Creates a replay error.
    pub fn replay(message: impl Into<String>) -> Self {
        Self::Replay {
            message: message.into(),
        }
    }
}
