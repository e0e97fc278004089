//! Error types for the globecam crate.

use std::fmt;

use crate::input::ListenerId;

/// Result type for globecam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building controllers or talking to an input source.
///
/// Runtime degradations (missing terrain, non-finite integration results) are
/// not errors; controllers absorb them and keep their last good state.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A configuration value is outside its valid range.
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// The input source refused an operation.
    InputSource {
        /// The operation that failed.
        operation: &'static str,
        /// The error message.
        message: String,
    },
    /// A listener id was not registered with the input source.
    UnknownListener(ListenerId),
}

impl Error {
    pub(crate) fn invalid_config(field: &'static str, detail: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig { field, detail } => {
                write!(f, "invalid config value for {field}: {detail}")
            }
            Error::InputSource { operation, message } => {
                write!(f, "input source {operation} failed: {message}")
            }
            Error::UnknownListener(id) => write!(f, "listener {id} is not registered"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::invalid_config("wheel_base", "must be positive, got 0");
        assert_eq!(
            err.to_string(),
            "invalid config value for wheel_base: must be positive, got 0"
        );

        let err = Error::InputSource {
            operation: "register",
            message: "target detached".into(),
        };
        assert_eq!(err.to_string(), "input source register failed: target detached");
    }
}
