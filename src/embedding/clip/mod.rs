//! CLIP image embedder (candle).
//!
//! Use [`ClipConfig::stub`] for tests and local runs without model files.

/// CLIP configuration.
pub mod config;


pub use config::{CLIP_BATCH_SIZE, CLIP_EMBEDDING_DIM, CLIP_IMAGE_SIZE, ClipConfig};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig as ClipModelConfig, ClipModel};
use image::RgbImage;
use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::embedding::device::select_device;
use crate::embedding::error::EmbeddingError;
use crate::embedding::provider::{EmbeddingProvider, l2_normalize};

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Side of the thumbnail the stub backend derives its vector from.
const STUB_THUMBNAIL_SIDE: u32 = 8;

enum EmbedderBackend {
    Model { model: ClipModel, device: Device },
    Stub,
}

/// CLIP ViT-B/32 image-feature extractor (supports stub mode).
pub struct ClipEmbedder {
    backend: EmbedderBackend,
    config: ClipConfig,
}

impl std::fmt::Debug for ClipEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipEmbedder")
            .field(
                "backend",
                &match &self.backend {
                    EmbedderBackend::Model { device, .. } => format!("Model({:?})", device),
                    EmbedderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.config.embedding_dim)
            .field("image_size", &self.config.image_size)
            .finish()
    }
}

impl ClipEmbedder {
    /// Loads the embedder from a config (stub mode is supported).
    pub fn load(config: ClipConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        if config.testing_stub {
            warn!("CLIP embedder running in STUB mode (testing only)");
            return Ok(Self {
                backend: EmbedderBackend::Stub,
                config,
            });
        }

        let device = select_device()?;
        debug!(?device, "Selected compute device for CLIP");

        // SAFETY: the checkpoint is mapped read-only and not modified while the model lives.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[config.model_path.as_path()], DType::F32, &device)
        }
        .map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("Failed to map safetensors: {}", e),
        })?;

        let model = ClipModel::new(vb, &ClipModelConfig::vit_base_patch32()).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to build CLIP model: {}", e),
            }
        })?;

        info!(
            model_path = %config.model_path.display(),
            embedding_dim = config.embedding_dim,
            image_size = config.image_size,
            "CLIP model loaded"
        );

        Ok(Self {
            backend: EmbedderBackend::Model { model, device },
            config,
        })
    }

    /// Returns `true` if a model is loaded.
    pub fn has_model(&self) -> bool {
        matches!(self.backend, EmbedderBackend::Model { .. })
    }

    /// Returns the embedder configuration.
    pub fn config(&self) -> &ClipConfig {
        &self.config
    }

    fn embed_with_model(
        &self,
        images: &[&RgbImage],
        model: &ClipModel,
        device: &Device,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mean = Tensor::new(&CLIP_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
        let std = Tensor::new(&CLIP_STD, &Device::Cpu)?.reshape((3, 1, 1))?;

        let mut results = Vec::with_capacity(images.len());
        for chunk in images.chunks(self.config.batch_size) {
            let pixel_values = chunk
                .iter()
                .map(|img| self.to_pixel_tensor(img, &mean, &std))
                .collect::<Result<Vec<_>, _>>()?;

            let batch = Tensor::stack(&pixel_values, 0)?.to_device(device)?;

            debug!(batch = chunk.len(), "CLIP forward pass");
            let features = model.get_image_features(&batch)?.to_vec2::<f32>()?;

            for mut feature in features {
                if feature.len() != self.config.embedding_dim {
                    return Err(EmbeddingError::InvalidConfig {
                        reason: format!(
                            "model produced {} dims, configured {}",
                            feature.len(),
                            self.config.embedding_dim
                        ),
                    });
                }
                l2_normalize(&mut feature);
                results.push(feature);
            }
        }

        Ok(results)
    }

    fn to_pixel_tensor(
        &self,
        image: &RgbImage,
        mean: &Tensor,
        std: &Tensor,
    ) -> Result<Tensor, EmbeddingError> {
        let side = self.config.image_size;
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbeddingError::UnreadableInput {
                reason: "zero-sized image".to_string(),
            });
        }

        let resized = image::imageops::resize(image, side, side, FilterType::CatmullRom);
        let tensor = Tensor::from_vec(resized.into_raw(), (side as usize, side as usize, 3), &Device::Cpu)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?
            .affine(1.0 / 255.0, 0.0)?
            .broadcast_sub(mean)?
            .broadcast_div(std)?;

        Ok(tensor)
    }

    /// Deterministic vector from an 8x8 thumbnail, tiled to the configured dimension.
    ///
    /// Similar pixels give similar vectors, which keeps retrieval tests meaningful
    /// without a checkpoint.
    fn embed_stub(&self, image: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbeddingError::UnreadableInput {
                reason: "zero-sized image".to_string(),
            });
        }

        let thumb = image::imageops::resize(
            image,
            STUB_THUMBNAIL_SIDE,
            STUB_THUMBNAIL_SIDE,
            FilterType::Triangle,
        );
        let raw = thumb.as_raw();

        let mut embedding: Vec<f32> = (0..self.config.embedding_dim)
            .map(|i| raw[i % raw.len()] as f32 / 255.0 + 1e-3)
            .collect();
        l2_normalize(&mut embedding);

        Ok(embedding)
    }
}

impl EmbeddingProvider for ClipEmbedder {
    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn embed_batch(&self, images: &[&RgbImage]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        match &self.backend {
            EmbedderBackend::Model { model, device } => {
                self.embed_with_model(images, model, device)
            }
            EmbedderBackend::Stub => images.iter().map(|img| self.embed_stub(img)).collect(),
        }
    }

    fn is_stub(&self) -> bool {
        matches!(self.backend, EmbedderBackend::Stub)
    }
}
