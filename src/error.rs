use thiserror::Error;

/// Errors surfaced by the loader, the feature builder, the optimizer and the model store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record at line {line}, column {column}: {token:?} is not a number")]
    MalformedRecord {
        line: u64,
        column: usize,
        token: String,
    },

    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("malformed model file at line {line}: {reason}")]
    MalformedModel { line: usize, reason: String },

    #[error("incomplete model file: {0}")]
    IncompleteModel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("plotting failed: {0}")]
    Plot(String),
}

impl Error {
    pub(crate) fn shape(what: &'static str, expected: impl ToString, got: impl ToString) -> Self {
        Error::ShapeMismatch {
            what,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
