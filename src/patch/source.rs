//! Decoded source images with stable identity.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbImage;
use image::imageops::FilterType;

use super::error::PatchError;
use crate::hashing::hash_image;

/// An RGB image plus the content hash that identifies it.
///
/// Cloning is cheap: pixels sit behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SourceImage {
    id: u64,
    pixels: Arc<RgbImage>,
}

impl SourceImage {
    /// Wraps decoded pixels, rejecting zero-sized images.
    pub fn new(pixels: RgbImage) -> Result<Self, PatchError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(PatchError::EmptyImage { width, height });
        }

        Ok(Self {
            id: hash_image(&pixels),
            pixels: Arc::new(pixels),
        })
    }

    /// Decodes PNG/JPEG/WebP/BMP bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PatchError> {
        Self::new(decode_image_bytes(bytes)?)
    }

    /// Decodes a base64 payload, with or without a `data:image/...;base64,` prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, PatchError> {
        Self::new(decode_base64_image(encoded)?)
    }

    /// Reads and decodes an image file.
    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let decoded = image::open(path).map_err(|e| PatchError::DecodeFailed {
            reason: format!("{}: {}", path.display(), e),
        })?;

        Self::new(decoded.to_rgb8())
    }

    /// Returns a bicubic resize to `side x side`. The result has its own identity.
    pub fn resized_square(&self, side: u32) -> Result<Self, PatchError> {
        if side == 0 {
            return Err(PatchError::ZeroResolution);
        }
        if self.pixels.dimensions() == (side, side) {
            return Ok(self.clone());
        }

        let resized = image::imageops::resize(&*self.pixels, side, side, FilterType::CatmullRom);
        Self::new(resized)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn shared_pixels(&self) -> Arc<RgbImage> {
        Arc::clone(&self.pixels)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Decodes a base64 image payload into RGB pixels.
pub fn decode_base64_image(encoded: &str) -> Result<RgbImage, PatchError> {
    let bytes = decode_base64_payload(encoded)?;
    decode_image_bytes(&bytes)
}

fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, PatchError> {
    if bytes.is_empty() {
        return Err(PatchError::DecodeFailed {
            reason: "empty payload".to_string(),
        });
    }

    image::load_from_memory(bytes)
        .map(|decoded| decoded.to_rgb8())
        .map_err(|e| PatchError::DecodeFailed {
            reason: e.to_string(),
        })
}

/// Strips an optional data-URI prefix and decodes standard base64.
pub fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>, PatchError> {
    let payload = match encoded.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };

    BASE64
        .decode(payload.trim())
        .map_err(|e| PatchError::InvalidBase64 {
            reason: e.to_string(),
        })
}

/// Encodes an image as PNG and returns standard base64.
pub fn encode_png_base64(pixels: &RgbImage) -> Result<String, PatchError> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    pixels
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| PatchError::DecodeFailed {
            reason: format!("png encode failed: {}", e),
        })?;
    Ok(BASE64.encode(buffer.into_inner()))
}
