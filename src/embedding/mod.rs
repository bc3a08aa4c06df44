//! Embedding providers.
//!
//! - [`EmbeddingProvider`] is the contract the pipeline depends on.
//! - [`clip`] implements it with a CLIP vision tower (or a deterministic stub).

/// CLIP image embedder.
pub mod clip;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
mod provider;

pub use clip::{CLIP_EMBEDDING_DIM, CLIP_IMAGE_SIZE, ClipConfig, ClipEmbedder};
pub use error::EmbeddingError;
pub use provider::{EmbeddingProvider, l2_normalize};
