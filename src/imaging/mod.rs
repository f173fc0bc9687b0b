//! Image intake: sniffing, normalization, size guarding, and pixel extraction.

pub mod guard;
pub mod matrix;
pub mod normalize;
pub mod sniff;

pub use guard::MetadataGuard;
pub use matrix::{extract, PixelMatrix, Rgba};
pub use normalize::{normalize, ImageAsset};
pub use sniff::{sniff_media_type, ALLOWED_MEDIA_TYPES};
