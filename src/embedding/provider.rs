use image::RgbImage;

use super::error::EmbeddingError;

/// Maps an image (a whole picture or one patch) to a fixed-length vector.
///
/// Implementations are synchronous and may block for the duration of a model forward
/// pass; the pipeline calls them from `tokio::task::spawn_blocking`.
///
/// Contract:
/// - every returned vector has exactly [`dimension`](Self::dimension) elements
/// - identical pixels produce identical vectors
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embeds a batch, preserving input order.
    fn embed_batch(&self, images: &[&RgbImage]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single image.
    fn embed(&self, image: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[image])?
            .pop()
            .ok_or_else(|| EmbeddingError::InferenceFailed {
                reason: "provider returned an empty batch".to_string(),
            })
    }

    /// Returns `true` for deterministic test backends with no model behind them.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Scales `vector` to unit L2 norm in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
