//! The error taxonomy every public operation in this crate returns through.

/// The single error type surfaced by every public operation.
///
/// This is the Rust rendering of the workbench's `{success, data} | {success: false, error}`
/// envelope: a `Result<T, EngineError>` *is* that envelope, so no separate wrapper struct
/// is needed. Each variant name matches an error code from the component design.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("engine is not ready: {0}")]
    NotReady(&'static str),

    #[error("{0}")]
    ValidationError(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("adding ancestor {ancestor} to {lexicon} would create a cycle")]
    Cycle { lexicon: i64, ancestor: i64 },

    /// Strict auto-spelling found no full segmentation of the input.
    #[error("no full segmentation found; unmatched suffix: {unmatched:?}")]
    NoCoverage { unmatched: String },

    #[error("internal invariant violated: {0}")]
    OperationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::ValidationError(msg.into())
    }

    pub fn not_found(kind: &'static str, id: i64) -> Self {
        EngineError::NotFound { kind, id }
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        EngineError::ConstraintViolation(msg.into())
    }
}
