//! Cross-cutting, shared constants.
//!
//! # Dimension Invariants
//!
//! Every embedding stored in the support index and every query embedding must share one
//! dimension, fixed by the embedding provider. A mismatch is a configuration error:
//!
//! 1. Use [`DimConfig`] to carry the dimension through initialization
//! 2. Use [`validate_embedding_dim`] at module boundaries to catch mismatches early

/// Output dimension of CLIP ViT-B/32 image features.
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// Square side (pixels) support and query images are resized to before patching.
pub const DEFAULT_SUPPORT_RESOLUTION: u32 = 224;

/// Patch side (pixels); 224 / 32 gives a 7x7 grid.
pub const DEFAULT_SUPPORT_PATCH_SIZE: u32 = 32;

/// Square side (pixels) of the query image shown to the reasoning model.
pub const DEFAULT_INPUT_RESOLUTION: u32 = 224;

pub const DEFAULT_K_RETRIEVAL: usize = 4;
pub const DEFAULT_MAX_PATCHES_PER_CLASS: usize = 3;
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 0.9;

pub const DEFAULT_EMBEDDING_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REASONING_TIMEOUT_MS: u64 = 120_000;

/// Class labels used when `RAGVISION_CLASSES` is not set.
pub const DEFAULT_CLASS_LABELS: [&str; 2] = ["dirty", "clean"];

/// Image file extensions accepted when bulk-loading a support directory.
pub const SUPPORT_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Runtime dimension configuration shared by the embedder and the support index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimConfig {
    /// The embedding vector dimension (number of floats).
    pub embedding_dim: usize,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl DimConfig {
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    /// Rejects a zero dimension.
    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroDimension);
        }
        Ok(())
    }
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimValidationError {
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// # Example
///
/// ```
/// use ragvision::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// validate_embedding_dim(512, DEFAULT_EMBEDDING_DIM).unwrap();
/// assert!(validate_embedding_dim(768, DEFAULT_EMBEDDING_DIM).is_err());
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_config_default() {
        let config = DimConfig::default();
        assert_eq!(config.embedding_dim, DEFAULT_EMBEDDING_DIM);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dim_config_validate_zero() {
        let config = DimConfig::new(0);
        assert_eq!(config.validate(), Err(DimValidationError::ZeroDimension));
    }

    #[test]
    fn test_validate_embedding_dim_mismatch() {
        assert_eq!(
            validate_embedding_dim(768, 512),
            Err(DimValidationError::DimensionMismatch {
                expected: 512,
                actual: 768
            })
        );
    }

    #[test]
    fn test_default_grid_divides_evenly() {
        assert_eq!(DEFAULT_SUPPORT_RESOLUTION % DEFAULT_SUPPORT_PATCH_SIZE, 0);
    }

    #[test]
    fn test_error_display() {
        let err = DimValidationError::DimensionMismatch {
            expected: 512,
            actual: 768,
        };
        assert!(err.to_string().contains("512"));
        assert!(err.to_string().contains("768"));
    }
}
