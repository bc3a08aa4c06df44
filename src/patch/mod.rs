//! Patch extraction.
//!
//! A [`PatchExtractor`] cuts a [`SourceImage`] into a row-major grid of square patches.
//!
//! # Edge policy
//!
//! Patches are **clipped**: when the image side is not a multiple of the patch size, the
//! last column and/or row holds narrower/shorter patches that end exactly at the image
//! border. The grid never overlaps and never leaves a gap. A clipped patch still records
//! the nominal `size` in its [`PatchId`].
//!
//! The pipeline resizes support and query images to a square resolution first, so with
//! the default 224/32 geometry every patch is full-size.

mod error;
mod source;

#[cfg(test)]
mod tests;

pub use error::PatchError;
pub use source::{SourceImage, decode_base64_image, decode_base64_payload, encode_png_base64};

use std::sync::Arc;

use image::RgbImage;

/// Identity of a patch: which image, where in the grid, and at what nominal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId {
    pub source_id: u64,
    pub row: u32,
    pub col: u32,
    pub size: u32,
}

/// Pixel rectangle covered by a patch, in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PatchBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchBounds {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn intersects(&self, other: &PatchBounds) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// An immutable square (or edge-clipped) region of a source image.
#[derive(Debug, Clone)]
pub struct Patch {
    id: PatchId,
    bounds: PatchBounds,
    pixels: Arc<RgbImage>,
}

impl Patch {
    pub fn id(&self) -> PatchId {
        self.id
    }

    pub fn bounds(&self) -> PatchBounds {
        self.bounds
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn shared_pixels(&self) -> Arc<RgbImage> {
        Arc::clone(&self.pixels)
    }

    /// Returns `true` if the patch was cut short by the image border.
    pub fn is_clipped(&self) -> bool {
        self.bounds.width < self.id.size || self.bounds.height < self.id.size
    }
}

/// Cuts images into patches of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct PatchExtractor {
    patch_size: u32,
}

impl PatchExtractor {
    pub fn new(patch_size: u32) -> Result<Self, PatchError> {
        if patch_size == 0 {
            return Err(PatchError::ZeroPatchSize);
        }
        Ok(Self { patch_size })
    }

    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }

    /// Returns the lazy grid over `image`. Iterate it as often as needed.
    pub fn grid<'a>(&self, image: &'a SourceImage) -> Result<PatchGrid<'a>, PatchError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PatchError::EmptyImage { width, height });
        }

        Ok(PatchGrid {
            image,
            size: self.patch_size,
            rows: height.div_ceil(self.patch_size),
            cols: width.div_ceil(self.patch_size),
        })
    }

    /// Materializes every patch of `image` in row-major order.
    pub fn extract(&self, image: &SourceImage) -> Result<Vec<Patch>, PatchError> {
        Ok(self.grid(image)?.iter().collect())
    }
}

/// Row-major patch grid over one image. Cheap to create; patches are cut on demand.
#[derive(Debug, Clone, Copy)]
pub struct PatchGrid<'a> {
    image: &'a SourceImage,
    size: u32,
    rows: u32,
    cols: u32,
}

impl<'a> PatchGrid<'a> {
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a fresh pass over the grid.
    pub fn iter(&self) -> PatchIter<'a> {
        PatchIter {
            grid: *self,
            next: 0,
        }
    }

    fn cut(&self, index: usize) -> Patch {
        let row = (index / self.cols as usize) as u32;
        let col = (index % self.cols as usize) as u32;
        let x = col * self.size;
        let y = row * self.size;
        let width = self.size.min(self.image.width() - x);
        let height = self.size.min(self.image.height() - y);

        let pixels = image::imageops::crop_imm(self.image.pixels(), x, y, width, height).to_image();

        Patch {
            id: PatchId {
                source_id: self.image.id(),
                row,
                col,
                size: self.size,
            },
            bounds: PatchBounds {
                x,
                y,
                width,
                height,
            },
            pixels: Arc::new(pixels),
        }
    }
}

impl<'a> IntoIterator for &PatchGrid<'a> {
    type Item = Patch;
    type IntoIter = PatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`PatchGrid::iter`].
#[derive(Debug, Clone)]
pub struct PatchIter<'a> {
    grid: PatchGrid<'a>,
    next: usize,
}

impl Iterator for PatchIter<'_> {
    type Item = Patch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.grid.len() {
            return None;
        }
        let patch = self.grid.cut(self.next);
        self.next += 1;
        Some(patch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PatchIter<'_> {}
