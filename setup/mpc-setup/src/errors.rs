use thiserror::Error;

/// Failure kinds of the ceremony.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("malformed input in {field}: {reason}")]
    MalformedInput { field: &'static str, reason: String },

    #[error("invalid contribution: {0} check failed")]
    InvalidContribution(&'static str),

    #[error("contribution chain mismatch: expected {expected}, found {found}")]
    ChainMismatch { expected: String, found: String },

    #[error("domain too small: need {required}, have {available}")]
    DomainTooSmall { required: usize, available: usize },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SetupError {
    pub fn malformed<E: ToString>(field: &'static str, reason: E) -> Self {
        SetupError::MalformedInput {
            field,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
