use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("support index holds no entries for any class")]
    EmptySupportSet,

    #[error("query produced no patch embeddings")]
    NoQueryPatches,

    #[error("invalid query dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query embedding {index} contains non-finite values")]
    NonFiniteQuery { index: usize },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
