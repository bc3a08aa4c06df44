//! BLAKE3-based identifiers for source images.

use blake3::Hasher;
use image::RgbImage;

/// Identity of a decoded image: dimensions plus raw RGB pixels, BLAKE3 truncated to
/// 64 bits.
///
/// Two encodings (PNG vs JPEG re-save) of the same pixels hash equal; a resize does not.
/// With 64 bits the birthday bound sits around four billion images, far above any
/// support set this service holds. A collision makes two different source images share
/// patch identities, so the later ingestion replaces the earlier one's patches.
#[inline]
pub fn hash_image(image: &RgbImage) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(&image.width().to_le_bytes());
    hasher.update(&image.height().to_le_bytes());
    hasher.update(image.as_raw());
    truncate(&hasher.finalize())
}

fn truncate(hash: &blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
