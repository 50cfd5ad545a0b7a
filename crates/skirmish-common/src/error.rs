//! Error types for Project Skirmish.

use thiserror::Error;

/// Top-level error type for Skirmish operations.
#[derive(Debug, Error)]
pub enum SkirmishError {
    /// Knowledge store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Knowledge payload errors
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knowledge store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Key contains characters the backend cannot address
    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),

    /// Backend I/O failure
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or incompatible knowledge payloads.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Payload text is not valid JSON of the expected shape
    #[error("Failed to parse payload: {0}")]
    Parse(String),

    /// A state entry names an action outside the action set
    #[error("Unknown action {action:?} in state {state:?}")]
    UnknownAction {
        /// State key holding the entry
        state: String,
        /// Offending action identifier
        action: String,
    },

    /// A value is NaN or infinite
    #[error("Non-finite value for action {action:?} in state {state:?}")]
    NonFiniteValue {
        /// State key holding the entry
        state: String,
        /// Action identifier
        action: String,
    },

    /// A scalar field is outside its legal range
    #[error("Field {field} out of range: {value}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Result type alias for Skirmish operations.
pub type SkirmishResult<T> = Result<T, SkirmishError>;
