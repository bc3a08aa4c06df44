use std::path::PathBuf;

use crate::embedding::error::EmbeddingError;

/// Default CLIP image-feature dimension (ViT-B/32 projection).
pub const CLIP_EMBEDDING_DIM: usize = crate::constants::DEFAULT_EMBEDDING_DIM;

/// Input side length the CLIP vision tower expects.
pub const CLIP_IMAGE_SIZE: u32 = 224;

/// Patches embedded per forward pass.
pub const CLIP_BATCH_SIZE: usize = 32;

/// Configuration for [`ClipEmbedder`](super::ClipEmbedder).
#[derive(Debug, Clone)]
pub struct ClipConfig {
    /// Path to the `model.safetensors` of an `openai/clip-vit-base-patch32` checkpoint.
    pub model_path: PathBuf,
    /// Side length each image is resized to before the forward pass.
    pub image_size: u32,
    /// Expected output dimension.
    pub embedding_dim: usize,
    /// Images per forward pass.
    pub batch_size: usize,
    /// If true, run in deterministic stub mode (no model files required).
    pub testing_stub: bool,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            image_size: CLIP_IMAGE_SIZE,
            embedding_dim: CLIP_EMBEDDING_DIM,
            batch_size: CLIP_BATCH_SIZE,
            testing_stub: false,
        }
    }
}

impl ClipConfig {
    /// Creates a config for a safetensors checkpoint.
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            ..Default::default()
        }
    }

    /// Creates a stub config (no model files; produces deterministic embeddings).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    /// Overrides the expected output dimension.
    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    /// Validates required fields for non-stub mode.
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be positive".to_string(),
            });
        }

        if self.image_size == 0 || self.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "image_size and batch_size must be positive".to_string(),
            });
        }

        if self.testing_stub {
            return Ok(());
        }

        if self.model_path.as_os_str().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "model_path is required (stubbing is disabled)".to_string(),
            });
        }

        if !self.model_path.exists() {
            return Err(EmbeddingError::ModelNotFound {
                path: self.model_path.clone(),
            });
        }

        Ok(())
    }

    /// Returns `true` if the checkpoint path exists.
    pub fn model_available(&self) -> bool {
        !self.model_path.as_os_str().is_empty() && self.model_path.exists()
    }
}
