use std::fmt;

/// Failures surfaced by message processing and dispatch.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("message hash mismatch: declared {declared}, computed {computed}")]
    Integrity { declared: String, computed: String },
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode: {0}")]
    Encode(String),
    #[error("failed to decode: {0}")]
    Decode(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} is not a valid hash: {value:?}")]
    InvalidHash { field: &'static str, value: String },
    #[error("a proposal needs at least two options, got {0}")]
    TooFewOptions(usize),
    #[error("option {0:?} is listed more than once")]
    DuplicateOption(String),
    #[error("days retention must be between 1 and 31, got {0}")]
    DaysRetention(u32),
}

/// Every field error found while validating a single request.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed validation: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn contains(&self, err: &ValidationError) -> bool {
        self.0.contains(err)
    }
}
