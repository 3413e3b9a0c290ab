//! Store error types for the key-value adapter layer.

use std::fmt;
use std::time::Duration;

/// Errors that can occur while talking to the shared key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be obtained from the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A command (or transaction) was rejected or failed mid-flight.
    #[error("Command error ({command}): {message}")]
    Command {
        /// The command that failed, e.g. `EXEC` or `SCAN`.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// The call did not complete within its deadline.
    #[error("Timed out after {elapsed_ms}ms: {operation}")]
    Timeout {
        /// The store operation that timed out.
        operation: String,
        /// The deadline that elapsed, in milliseconds.
        elapsed_ms: u64,
    },

    /// A stored payload could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the encoding failure.
        message: String,
    },

    /// The backend answered with a reply of the wrong shape.
    #[error("Unexpected reply: {message}")]
    UnexpectedReply {
        /// Description of what was expected.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, deadline: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: deadline.as_millis() as u64,
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `UnexpectedReply` error.
    #[must_use]
    pub fn unexpected_reply(message: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            message: message.into(),
        }
    }

    /// Returns `true` if the call hit its deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => ErrorCategory::Unavailable,
            Self::Command { .. } | Self::UnexpectedReply { .. } => ErrorCategory::Backend,
            Self::Serialization { .. } => ErrorCategory::Serialization,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The backend could not be reached in time.
    Unavailable,
    /// The backend was reached but the command failed.
    Backend,
    /// A payload could not be (de)serialized.
    Serialization,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Backend => write!(f, "backend"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}
