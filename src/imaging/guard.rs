//! Pixel-area ceiling for decoded images.

use crate::{Error, Result};
use image::ImageReader;
use std::io::Cursor;

/// Rejects images whose `width * height` exceeds a fixed ceiling.
#[derive(Debug, Clone, Copy)]
pub struct MetadataGuard {
    max_pixels: u64,
}

impl MetadataGuard {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Validate dimensions, returning them unchanged when acceptable.
    pub fn check(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!("image has no area ({}x{})", width, height)));
        }
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(Error::ImageTooLarge { width, height, max: self.max_pixels });
        }
        Ok((width, height))
    }

    /// Read dimensions from an encoded header without decoding pixel data,
    /// then [`check`](Self::check) them.
    pub fn probe(&self, bytes: &[u8]) -> Result<(u32, u32)> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::InvalidImage(e.to_string()))?
            .into_dimensions()
            .map_err(|e| Error::InvalidImage(e.to_string()))?;
        self.check(width, height)
    }
}

impl Default for MetadataGuard {
    fn default() -> Self {
        Self::new(4_000_000)
    }
}
