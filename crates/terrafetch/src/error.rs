//! Error types for the terrafetch crate.

use std::fmt;

/// Result type for terrafetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of a failure, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The resource is confirmed absent or cannot be opened.
    ResourceUnavailable,
    /// A transport, feature or collaborating service is not available.
    ServiceUnavailable,
    /// Malformed input: references, headers, policies or settings.
    ConfigurationError,
    /// Anything else, carrying the underlying message.
    GeneralError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::ResourceUnavailable => "resource unavailable",
            ErrorKind::ServiceUnavailable => "service unavailable",
            ErrorKind::ConfigurationError => "configuration error",
            ErrorKind::GeneralError => "general error",
        })
    }
}

/// Errors that can occur while resolving or fetching content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The resource does not exist (404, missing file) or could not be opened.
    ResourceUnavailable {
        /// The resolved reference that failed.
        uri: String,
        /// The error message.
        message: String,
    },
    /// A transport or service is unavailable.
    ServiceUnavailable {
        /// The error message.
        message: String,
    },
    /// Invalid configuration or malformed input.
    Configuration {
        /// Context for where the error occurred.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// Any other failure.
    General {
        /// The resolved reference that failed.
        uri: String,
        /// The error message.
        message: String,
    },
}

impl Error {
    /// The classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            Error::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Error::Configuration { .. } => ErrorKind::ConfigurationError,
            Error::General { .. } => ErrorKind::GeneralError,
        }
    }

    /// The diagnostic message carried by this error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Error::ResourceUnavailable { message, .. }
            | Error::ServiceUnavailable { message }
            | Error::General { message, .. } => message,
            Error::Configuration { detail, .. } => detail,
        }
    }

    pub(crate) fn resource_unavailable(uri: &str, message: impl Into<String>) -> Self {
        Error::ResourceUnavailable {
            uri: uri.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn service_unavailable(message: impl Into<String>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn general(uri: &str, message: impl Into<String>) -> Self {
        Error::General {
            uri: uri.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceUnavailable { uri, message } => {
                write!(f, "resource {uri} unavailable: {message}")
            }
            Error::ServiceUnavailable { message } => {
                write!(f, "service unavailable: {message}")
            }
            Error::Configuration { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
            Error::General { uri, message } => {
                write!(f, "request for {uri} failed: {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Configuration {
            context: "json",
            detail: e.to_string(),
        }
    }
}
