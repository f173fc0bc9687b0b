//! Content-based media type detection.
//!
//! Caller-declared types (headers, extensions) are never consulted.

use image::ImageFormat;

/// Image types accepted by the normalizer.
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
    "image/avif",
];

// Non-image signatures worth naming so they are reported as unsupported
// instead of unknown.
const DOCUMENT_SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (b"Rar!\x1a\x07", "application/vnd.rar"),
    (b"\x7fELF", "application/x-elf"),
    (b"OggS", "audio/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"<?xml", "application/xml"),
];

/// Sniff the media type of `bytes`, or `None` if no signature matches.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if let Some(mime) = sniff_iso_bmff(bytes) {
        return Some(mime);
    }

    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type());
    }

    DOCUMENT_SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, mime)| *mime)
        .or_else(|| sniff_html(bytes))
}

/// Whether a sniffed type is on the allow-list.
pub fn is_allowed(mime: &str) -> bool {
    ALLOWED_MEDIA_TYPES.contains(&mime)
}

/// Codec format for an allowed media type.
pub fn image_format(mime: &str) -> Option<ImageFormat> {
    ImageFormat::from_mime_type(mime)
}

// `ftyp` box brands: AVIF, HEIF and the MP4 family share this container.
fn sniff_iso_bmff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return None;
    }
    match &bytes[8..12] {
        b"avif" | b"avis" => Some("image/avif"),
        b"heic" | b"heix" | b"mif1" | b"msf1" => Some("image/heic"),
        b"qt  " => Some("video/quicktime"),
        _ => Some("video/mp4"),
    }
}

fn sniff_html(bytes: &[u8]) -> Option<&'static str> {
    let head = &bytes[..bytes.len().min(64)];
    let text = String::from_utf8_lossy(head).trim_start().to_ascii_lowercase();
    if text.starts_with("<!doctype html") || text.starts_with("<html") {
        Some("text/html")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_image_signatures() {
        assert_eq!(sniff_media_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some("image/png"));
        assert_eq!(sniff_media_type(b"\xff\xd8\xff\xe0\0\x10JFIF\0"), Some("image/jpeg"));
        assert_eq!(sniff_media_type(b"GIF89a\x01\0\x01\0"), Some("image/gif"));
        assert_eq!(sniff_media_type(b"\0\0\0\x1cftypavif\0\0\0\0"), Some("image/avif"));
    }

    #[test]
    fn pdf_is_known_but_not_allowed() {
        let mime = sniff_media_type(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        assert_eq!(mime, "application/pdf");
        assert!(!is_allowed(mime));
    }

    #[test]
    fn html_is_recognised() {
        assert_eq!(sniff_media_type(b"  <!DOCTYPE html><html></html>"), Some("text/html"));
    }

    #[test]
    fn random_bytes_are_unknown() {
        assert_eq!(sniff_media_type(b"just some plain text"), None);
        assert_eq!(sniff_media_type(b""), None);
    }

    #[test]
    fn allow_list_maps_to_codec_formats() {
        for mime in ALLOWED_MEDIA_TYPES {
            assert!(image_format(mime).is_some(), "{} has no codec format", mime);
        }
    }
}
