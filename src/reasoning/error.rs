use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReasoningError {
    #[error("reasoning service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("reasoning service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable reasoning response: {reason}")]
    InvalidResponse { reason: String },

    #[error("reasoning service returned no transcript")]
    EmptyTranscript,

    #[error("reasoning call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("failed to encode prompt: {reason}")]
    Encoding { reason: String },

    #[error("invalid sampling parameters: {reason}")]
    InvalidSampling { reason: String },
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ReasoningError::InvalidResponse {
                reason: err.to_string(),
            }
        } else {
            ReasoningError::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}
