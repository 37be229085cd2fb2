//! Error types for directory operations.
//!
//! Errors are split by origin. Codec failures are local and recoverable, so they have their own
//! [`CodecError`] type that callers can match on without going through [`Error`]. Relation
//! failures abort the operation before any search is issued. Transport failures come from the
//! directory server or the network and are propagated unchanged.

use thiserror::Error;

/// Failure while converting a raw attribute value into a typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Binary value too short, or otherwise missing mandatory fields.
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// Value matched neither the textual nor the binary representation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure while scoping or resolving a relation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationError {
    /// The parent entry lacks the attribute needed to build the scoping filter.
    #[error("relation `{relation}` cannot be scoped: parent has no `{key}`")]
    MissingParentKey {
        /// Name of the relation being resolved
        relation: String,
        /// Key attribute that was missing on the parent
        key: String,
    },

    /// A polymorphic relation could not pick exactly one target type for an entry.
    #[error("cannot determine target type of `{dn}` (matching types: {candidates:?})")]
    AmbiguousTarget {
        /// Distinguished name of the offending entry
        dn: String,
        /// Names of the target types that matched (empty when none matched)
        candidates: Vec<String>,
    },
}

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Attribute value conversion failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Relation scoping or resolution failed
    #[error(transparent)]
    Relation(#[from] RelationError),

    /// The directory transport reported a failure
    #[error("Directory {operation} failed: {message}")]
    Transport {
        /// Operation that failed (bind, search, modify, ...)
        operation: String,
        /// Message reported by the transport
        message: String,
    },

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed distinguished name
    #[error("Invalid distinguished name: {0}")]
    InvalidDn(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a transport error for the named operation.
    #[must_use]
    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Codec(CodecError::InvalidFormat(_)) => "CODEC_INVALID_FORMAT",
            Self::Codec(CodecError::InvalidInput(_)) => "CODEC_INVALID_INPUT",
            Self::Relation(RelationError::MissingParentKey { .. }) => "MISSING_PARENT_KEY",
            Self::Relation(RelationError::AmbiguousTarget { .. }) => "AMBIGUOUS_TARGET",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidDn(_) => "INVALID_DN",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Transport { .. } | Self::Timeout(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid directory URL: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}
