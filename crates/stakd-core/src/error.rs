//! Error types for Stakd core.

use crate::api::ApiError;

/// Errors that can occur anywhere in the Stakd client stack.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport or application error returned by the REST layer.
    ///
    /// Network failures are normalized into this variant as well, with
    /// code [`ApiError::NETWORK_ERROR`].
    #[error("API error: {0}")]
    Api(ApiError),

    /// Client-side validation failure (never reaches the network).
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation, if known
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Change-event listener failure.
    #[error("Subscription error: {message}")]
    Subscription {
        /// What went wrong
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (config files etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type alias for Stakd operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether this error is transient.
    ///
    /// Network failures, 5xx responses and listener failures may succeed on
    /// a later attempt; validation and configuration problems never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(api) => api.is_retryable(),
            Error::Subscription { .. } => true,
            Error::Io(_) => true,
            Error::Validation { .. } => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new subscription error.
    pub fn subscription<S: Into<String>>(message: S) -> Self {
        Error::Subscription {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Returns the API error if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(err)
    }
}
