use crate::source::CyclePhase;
use std::time::Duration;

/// Why a single field could not be read from a status document.
///
/// These never abort a collection cycle; the normalizer logs them and
/// substitutes a zero.
///
/// # Examples
///
/// ```rust
/// use mongomon_collector::error::ExtractError;
///
/// let err = ExtractError::KeyNotFound { key: "opcounters".to_string() };
/// assert!(err.to_string().contains("opcounters"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// A non-final path key did not lead to a nested mapping.
    #[error("cannot handle '{key}' as a mapping")]
    NotAMapping { key: String },

    /// The leaf value's textual form does not parse as a number.
    #[error("value of '{key}' is not numeric: {raw}")]
    NotNumeric { key: String, raw: String },

    /// A path key is missing from its mapping.
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },
}

/// Errors that abort a whole collection cycle.
///
/// # Examples
///
/// ```rust
/// use mongomon_collector::error::SourceError;
///
/// let err = SourceError::CommandFailed("unauthorized".to_string());
/// assert!(err.to_string().contains("unauthorized"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The endpoint could not be reached or rejected the credentials.
    #[error("MongoDB connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect plus command did not finish within the allowed time.
    #[error("MongoDB serverStatus timed out after {limit:?} while {phase}")]
    Timeout { limit: Duration, phase: CyclePhase },

    /// The server answered the status command with an error.
    #[error("MongoDB serverStatus command failed: {0}")]
    CommandFailed(String),

    /// The reply could not be decoded into a status document.
    #[error("MongoDB serverStatus reply could not be decoded: {0}")]
    DecodeFailed(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, SourceError>;
