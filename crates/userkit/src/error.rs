//! Error types for user reconciliation.
//!
//! Errors are categorized so callers can tell the convergent "not found" case
//! apart from failures that have to be surfaced. Only the adapter that raised a
//! transport error can say whether it means "not found"; see
//! [`UserApi::is_not_found`](crate::family::UserApi::is_not_found).

use std::fmt;

use crate::family::{ApiFamily, v6, v7};
use crate::transport;

/// Result type alias for user operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The remote operation an error was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create or replace a user.
    Put,
    /// Fetch a user.
    Get,
    /// Remove a user.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Put => "put user",
            Self::Get => "get user",
            Self::Delete => "delete user",
        };
        f.write_str(verb)
    }
}

/// Categories of errors, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The user does not exist on the cluster.
    NotFound,
    /// The client generation cannot perform the operation.
    Unsupported,
    /// Metadata could not be translated to or from JSON.
    Encoding,
    /// Any other failure reported by the cluster or the network.
    Transport,
    /// The declared username does not match the stored identity.
    Identity,
}

impl ErrorCategory {
    /// Whether reconciliation treats this category as convergent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "User not found",
            Self::Unsupported => "Unsupported client",
            Self::Encoding => "Invalid metadata",
            Self::Transport => "Cluster request failed",
            Self::Identity => "Username changed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Run refresh to drop the user from local state",
            Self::Unsupported => "Managing users requires an Elasticsearch 6.x or 7.x cluster",
            Self::Encoding => "Metadata must be a JSON object",
            Self::Transport => "Check the cluster URL and the cluster logs, then try again",
            Self::Identity => "Destroy the old user and apply again to create the renamed one",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A failure reported by the underlying client, kept in its generation's shape.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Raised by the 7.x client.
    #[error(transparent)]
    V7(#[from] v7::ApiError),

    /// Raised by the 6.x client.
    #[error(transparent)]
    V6(#[from] v6::ResponseError),

    /// Raised before any client generation was chosen (version detection).
    #[error(transparent)]
    Request(#[from] transport::Error),
}

impl TransportError {
    /// The client generation that produced this error, if any.
    #[must_use]
    pub fn family(&self) -> Option<ApiFamily> {
        match self {
            Self::V7(_) => Some(ApiFamily::V7),
            Self::V6(_) => Some(ApiFamily::V6),
            Self::Request(_) => None,
        }
    }

    /// Apply the producing generation's own "not found" predicate.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::V7(err) => err.is_not_found(),
            Self::V6(err) => err.is_not_found(),
            Self::Request(_) => false,
        }
    }
}

/// Errors that can occur while reconciling a user.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metadata is not a JSON object, or a response could not be translated.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the problem.
        message: String,
    },

    /// The client generation has no API for this operation.
    #[error("{operation} is not supported by the Elasticsearch {family} client")]
    UnsupportedOperation {
        /// Generation of the client that was asked.
        family: ApiFamily,
        /// Operation that was attempted.
        operation: Operation,
    },

    /// The client handle is none of the known generations.
    #[error("unsupported client: {found}")]
    UnsupportedClient {
        /// What was found instead.
        found: String,
    },

    /// The cluster or the network reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The configuration renamed a user that already exists.
    #[error("username is immutable: state holds {current:?}, configuration declares {desired:?}")]
    UsernameChanged {
        /// Identity recorded in local state.
        current: String,
        /// Username in the declared configuration.
        desired: String,
    },
}

impl Error {
    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(family: ApiFamily, operation: Operation) -> Self {
        Self::UnsupportedOperation { family, operation }
    }

    /// Get the error category for reporting.
    ///
    /// Transport errors are classified with the predicate of the generation
    /// that raised them.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Encoding { .. } => ErrorCategory::Encoding,
            Error::UnsupportedOperation { .. } | Error::UnsupportedClient { .. } => {
                ErrorCategory::Unsupported
            }
            Error::Transport(err) if err.is_not_found() => ErrorCategory::NotFound,
            Error::Transport(_) => ErrorCategory::Transport,
            Error::UsernameChanged { .. } => ErrorCategory::Identity,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::encoding(err.to_string())
    }
}

impl From<v7::ApiError> for Error {
    fn from(err: v7::ApiError) -> Self {
        Self::Transport(TransportError::V7(err))
    }
}

impl From<v6::ResponseError> for Error {
    fn from(err: v6::ResponseError) -> Self {
        Self::Transport(TransportError::V6(err))
    }
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        Self::Transport(TransportError::Request(err))
    }
}
