//! Error values surfaced by the binding.

use crate::config::ConfigError;

/// Message used when the engine fails without leaving any diagnostic text.
pub const UNKNOWN_NATIVE_ERROR: &str = "unknown native error";

/// Errors that can occur while calling into the image engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{operation} failed with status {status}: {message}")]
    Native {
        operation: &'static str,
        status: i32,
        message: String,
    },

    #[error("{operation} reported success but produced no image")]
    MissingOutput { operation: &'static str },

    #[error("Invalid argument for {operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },

    #[error("Native library startup failed: {0}")]
    Startup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Build a native-call error from the engine's last-error text.
    pub fn native(operation: &'static str, status: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = message.trim();
        Error::Native {
            operation,
            status,
            message: if message.is_empty() {
                UNKNOWN_NATIVE_ERROR.to_owned()
            } else {
                message.to_owned()
            },
        }
    }

    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    /// Operation name attached to the error, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::Native { operation, .. }
            | Error::MissingOutput { operation }
            | Error::InvalidArgument { operation, .. } => Some(operation),
            Error::Startup(_) | Error::Config(_) => None,
        }
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, Error>;
