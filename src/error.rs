//! Error types for the pixel service

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving an image or page request
#[derive(Error, Debug)]
pub enum Error {
    /// Target URL uses a scheme other than http/https
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// Target host is loopback, private, or link-local
    #[error("Forbidden host: {0}")]
    ForbiddenHost(String),

    /// Upstream fetch failed (network error, non-2xx, oversized body)
    #[error("Failed to fetch: {0}")]
    FetchFailed(String),

    /// Content signature did not match any known type
    #[error("Unknown file type")]
    UnknownFileType,

    /// Content was sniffed but is not an accepted image type
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Image could not be decoded or has no dimensions
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Decoded pixel area exceeds the configured ceiling
    #[error("Image too large: {width}x{height} exceeds {max} pixels")]
    ImageTooLarge { width: u32, height: u32, max: u64 },

    /// Page navigation did not settle in time
    #[error("Navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    /// Browser launch, navigation, or capture failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Required query parameter was absent
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Anything outside the caller-facing taxonomy
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is caused by the request or its target and may be
    /// reported verbatim to the caller.
    pub fn is_caller_facing(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Internal(_))
    }
}
