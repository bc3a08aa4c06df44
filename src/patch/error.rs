use thiserror::Error;

/// Errors raised while decoding images or cutting them into patches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The image has a zero width or height.
    #[error("image is empty: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// Patch size must be at least one pixel.
    #[error("patch size must be positive")]
    ZeroPatchSize,

    /// Target resolution must be at least one pixel.
    #[error("resize target must be positive")]
    ZeroResolution,

    /// Base64 payload could not be decoded.
    #[error("invalid base64 image payload: {reason}")]
    InvalidBase64 { reason: String },

    /// Bytes are not a decodable image.
    #[error("failed to decode image: {reason}")]
    DecodeFailed { reason: String },
}
