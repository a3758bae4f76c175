use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Finalization was attempted before the topology had an input layer, an
    /// output layer and at least one hidden layer.
    #[error("incomplete topology: {0}")]
    IncompleteTopology(String),

    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown activation function `{0}`")]
    UnknownActivation(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing section `{0}`")]
    MissingSection(String),

    #[error("layer count must be defined before `{0}`")]
    LayerCountUndefined(String),

    #[error("truncated file: {0}")]
    TruncatedFile(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unmatched variable: {0}")]
    UnmatchedVariable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn dims(what: &'static str, expected: usize, got: usize) -> Self {
        Error::DimensionMismatch {
            what,
            expected,
            got,
        }
    }
}
