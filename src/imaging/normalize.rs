//! Untrusted bytes to canonical RGBA.

use super::guard::MetadataGuard;
use super::sniff;
use crate::{Error, Result};
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use log::debug;
use std::io::Cursor;

/// A validated image in canonical form: 8-bit RGBA, row-major.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    media_type: &'static str,
    pixels: RgbaImage,
}

impl ImageAsset {
    /// Media type sniffed from the source bytes.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Canonical raw pixel bytes, 4 per pixel.
    pub fn raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Losslessly encode the canonical pixels as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| Error::Internal(format!("PNG encode failed: {}", e)))?;
        Ok(out.into_inner())
    }
}

/// Sniff, allow-list, and decode `bytes` into an [`ImageAsset`].
///
/// The source header is checked against `guard` before the full decode so
/// an oversized image never gets its pixel buffer allocated.
pub fn normalize(bytes: &[u8], guard: &MetadataGuard) -> Result<ImageAsset> {
    let media_type = sniff::sniff_media_type(bytes).ok_or(Error::UnknownFileType)?;
    if !sniff::is_allowed(media_type) {
        return Err(Error::UnsupportedMediaType(media_type.to_string()));
    }
    let format = sniff::image_format(media_type)
        .ok_or_else(|| Error::UnsupportedMediaType(media_type.to_string()))?;

    let pixels = match format {
        ImageFormat::Png => decode_png(bytes, guard)?,
        _ => decode_with_codec(bytes, format, guard)?,
    };
    debug!("normalized {} {}x{} to rgba8", media_type, pixels.width(), pixels.height());

    Ok(ImageAsset { media_type, pixels })
}

fn decode_with_codec(bytes: &[u8], format: ImageFormat, guard: &MetadataGuard) -> Result<RgbaImage> {
    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| Error::InvalidImage(e.to_string()))?;
    guard.check(width, height)?;

    // Multi-frame sources (GIF, WebP) contribute their first frame.
    let decoded = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(|e| Error::InvalidImage(e.to_string()))?;
    Ok(decoded.into_rgba8())
}

/// PNG goes through `png` directly so chunk CRC mismatches are tolerated;
/// damaged pixel data is still an error.
fn decode_png(bytes: &[u8], guard: &MetadataGuard) -> Result<RgbaImage> {
    let mut options = png::DecodeOptions::default();
    options.set_ignore_crc(true);
    let mut decoder = png::Decoder::new_with_options(Cursor::new(bytes), options);
    decoder.set_transformations(png::Transformations::normalize_to_color8());

    let mut reader = decoder.read_info().map_err(|e| Error::InvalidImage(format!("PNG header: {}", e)))?;
    let (width, height) = {
        let info = reader.info();
        (info.width, info.height)
    };
    guard.check(width, height)?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| Error::InvalidImage(format!("PNG data: {}", e)))?;
    buf.truncate(frame.buffer_size());

    let image = match frame.color_type {
        png::ColorType::Rgba => RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8),
        png::ColorType::Rgb => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
        png::ColorType::GrayscaleAlpha => {
            GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        png::ColorType::Grayscale => GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
        png::ColorType::Indexed => None,
    };
    image
        .map(DynamicImage::into_rgba8)
        .ok_or_else(|| Error::InvalidImage(format!("PNG frame has unexpected layout ({:?})", frame.color_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn rgb_source_gains_alpha() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(1, 0, Rgb([40, 50, 60]));
        let bmp = encode(DynamicImage::ImageRgb8(img), ImageFormat::Bmp);

        let asset = normalize(&bmp, &MetadataGuard::default()).unwrap();
        assert_eq!(asset.media_type(), "image/bmp");
        assert_eq!((asset.width(), asset.height()), (2, 1));
        assert_eq!(asset.raw(), &[10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn canonical_png_round_trips() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        let png = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let asset = normalize(&png, &MetadataGuard::default()).unwrap();
        let again = normalize(&asset.to_png().unwrap(), &MetadataGuard::default()).unwrap();
        assert_eq!(again.raw(), &[1, 2, 3, 4]);
    }

    #[test]
    fn pdf_is_unsupported() {
        let err = normalize(b"%PDF-1.4\n1 0 obj\n", &MetadataGuard::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(ref m) if m == "application/pdf"));
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        let err = normalize(b"hello world", &MetadataGuard::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownFileType));
    }

    #[test]
    fn oversized_source_is_rejected_before_decode() {
        let png = encode(DynamicImage::ImageRgba8(RgbaImage::new(20, 20)), ImageFormat::Png);
        let err = normalize(&png, &MetadataGuard::new(399)).unwrap_err();
        assert!(matches!(err, Error::ImageTooLarge { width: 20, height: 20, max: 399 }));
    }

    /// Overwrite the CRC of every chunk of type `kind`.
    fn corrupt_crc(png: &mut [u8], kind: &[u8; 4]) {
        let mut at = 8;
        while at + 12 <= png.len() {
            let len = u32::from_be_bytes([png[at], png[at + 1], png[at + 2], png[at + 3]]) as usize;
            let crc = at + 8 + len;
            if &png[at + 4..at + 8] == kind {
                for b in &mut png[crc..crc + 4] {
                    *b ^= 0xff;
                }
            }
            at = crc + 4;
        }
    }

    #[test]
    fn bad_chunk_crc_is_tolerated() {
        let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8 * 60, y as u8 * 60, 90, 200]));
        let mut png = encode(DynamicImage::ImageRgba8(img.clone()), ImageFormat::Png);
        corrupt_crc(&mut png, b"IDAT");
        corrupt_crc(&mut png, b"IEND");

        let asset = normalize(&png, &MetadataGuard::default()).unwrap();
        assert_eq!(asset.media_type(), "image/png");
        assert_eq!(asset.raw(), img.as_raw().as_slice());
    }

    #[test]
    fn palette_and_gray_pngs_expand_to_rgba() {
        let gray = encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, image::Luma([77]))), ImageFormat::Png);
        let asset = normalize(&gray, &MetadataGuard::default()).unwrap();
        assert_eq!(&asset.raw()[..4], &[77, 77, 77, 255]);

        let rgb = encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]))), ImageFormat::Png);
        let asset = normalize(&rgb, &MetadataGuard::default()).unwrap();
        assert_eq!(asset.raw(), &[1, 2, 3, 255]);
    }

    #[cfg(feature = "avif")]
    #[test]
    fn avif_decodes_when_enabled() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([200, 40, 40, 255]));
        let avif = encode(DynamicImage::ImageRgba8(img), ImageFormat::Avif);

        let asset = normalize(&avif, &MetadataGuard::default()).unwrap();
        assert_eq!(asset.media_type(), "image/avif");
        assert_eq!((asset.width(), asset.height()), (8, 8));
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn avif_without_decoder_is_invalid() {
        let err = normalize(b"\0\0\0\x1cftypavif\0\0\0\0mif1avif", &MetadataGuard::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn truncated_image_is_invalid() {
        let png = encode(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)), ImageFormat::Png);
        let err = normalize(&png[..20], &MetadataGuard::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }
}
