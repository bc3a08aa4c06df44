use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::patch::PatchError;
use crate::reasoning::ReasoningError;
use crate::retrieval::RetrievalError;

/// Every failure a pipeline operation can surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or empty input image; rejected before any model call.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Embedding dimension disagrees with the index. Configuration error, not retryable.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown class label '{0}'")]
    UnknownLabel(String),

    /// No support entries exist for any label.
    #[error("support set is empty")]
    EmptySupportSet,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The reasoning service produced no transcript.
    #[error("upstream model failed: {0}")]
    UpstreamModel(ReasoningError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable kind, used for status headers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::InvalidRequest(_) => "invalid_request",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::UnknownLabel(_) => "unknown_label",
            Self::EmptySupportSet => "empty_support_set",
            Self::Embedding(_) => "embedding_error",
            Self::UpstreamModel(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<PatchError> for PipelineError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::ZeroPatchSize | PatchError::ZeroResolution => {
                Self::InvalidRequest(err.to_string())
            }
            PatchError::EmptyImage { .. }
            | PatchError::InvalidBase64 { .. }
            | PatchError::DecodeFailed { .. } => Self::InvalidImage(err.to_string()),
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            IndexError::UnknownLabel { label } => Self::UnknownLabel(label),
            IndexError::InvalidLabelSet { .. } => Self::InvalidRequest(err.to_string()),
            IndexError::NonFiniteEmbedding { .. } => Self::Embedding(
                EmbeddingError::InferenceFailed {
                    reason: err.to_string(),
                },
            ),
        }
    }
}

impl From<RetrievalError> for PipelineError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::EmptySupportSet => Self::EmptySupportSet,
            RetrievalError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            RetrievalError::NoQueryPatches => Self::InvalidImage(err.to_string()),
            RetrievalError::NonFiniteQuery { .. } => Self::Embedding(
                EmbeddingError::InferenceFailed {
                    reason: err.to_string(),
                },
            ),
        }
    }
}

impl From<ReasoningError> for PipelineError {
    fn from(err: ReasoningError) -> Self {
        match err {
            ReasoningError::InvalidSampling { .. } => Self::InvalidRequest(err.to_string()),
            other => Self::UpstreamModel(other),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
