//! Per-pixel color extraction from canonical RGBA buffers.

use crate::{Error, Result};
use serde::Serialize;

/// One `(r, g, b, a)` pixel.
pub type Rgba = [u8; 4];

/// Colors addressed as `[x][y]`, serialized as nested JSON arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PixelMatrix {
    columns: Vec<Vec<Rgba>>,
}

impl PixelMatrix {
    pub fn width(&self) -> u32 {
        self.columns.len() as u32
    }

    pub fn height(&self) -> u32 {
        self.columns.first().map(|c| c.len() as u32).unwrap_or(0)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        self.columns.get(x as usize)?.get(y as usize).copied()
    }

    pub fn columns(&self) -> &[Vec<Rgba>] {
        &self.columns
    }
}

/// Build a [`PixelMatrix`] from row-major RGBA bytes (4 bytes per pixel).
///
/// A buffer whose length disagrees with `width * height * 4` means an earlier
/// stage is broken, so it is reported as [`Error::Internal`] rather than a
/// caller error.
pub fn extract(raw: &[u8], width: u32, height: u32) -> Result<PixelMatrix> {
    let (w, h) = (width as usize, height as usize);
    let expected = w
        .checked_mul(h)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::Internal(format!("pixel count overflow for {}x{}", width, height)))?;
    if raw.len() != expected {
        return Err(Error::Internal(format!(
            "raw buffer is {} bytes, expected {} for {}x{}",
            raw.len(),
            expected,
            width,
            height
        )));
    }

    let mut columns: Vec<Vec<Rgba>> = (0..w).map(|_| Vec::with_capacity(h)).collect();
    // Rows arrive top to bottom, so each column fills in increasing y.
    for (i, px) in raw.chunks_exact(4).enumerate() {
        columns[i % w].push([px[0], px[1], px[2], px[3]]);
    }
    Ok(PixelMatrix { columns })
}
