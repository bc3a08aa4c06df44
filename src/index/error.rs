use thiserror::Error;

/// Errors returned by support-index operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Embedding length differs from the index dimension.
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Index dimension.
        expected: usize,
        /// Offending vector length.
        actual: usize,
    },

    /// Embedding holds a NaN or infinite component.
    #[error("support embedding has a non-finite component at position {position}")]
    NonFiniteEmbedding {
        /// Index of the first offending component.
        position: usize,
    },

    /// Label is not part of the configured label set.
    #[error("unknown class label: '{label}'")]
    UnknownLabel {
        /// The rejected label.
        label: String,
    },

    /// Label set is empty or contains duplicates.
    #[error("invalid label set: {reason}")]
    InvalidLabelSet {
        /// What is wrong with it.
        reason: String,
    },
}
