//! RFox Pixels
//!
//! Turns images and rendered web pages into structured pixel data and
//! clickable-region maps, for callers that cannot decode images or run a
//! browser themselves.
//!
//! # Pipeline
//!
//! - **Admission gate**: every request holds one of a fixed number of slots
//! - **Host validation**: only public `http`/`https` targets are fetched or rendered
//! - **Normalization**: content is sniffed, allow-listed, and decoded to RGBA
//! - **Guarding**: decoded area is capped before extraction
//! - **Extraction**: RGBA bytes become an `[x][y]` color matrix
//! - **Collection**: rendered pages also yield page-absolute clickable regions,
//!   including those inside nested frames and framesets
//!
//! # Example
//!
//! ```no_run
//! use rfpixels::{pipeline::{Service, View}, ServiceConfig};
//!
//! # async fn run() -> rfpixels::Result<()> {
//! let service = Service::new(&ServiceConfig::default())?;
//! let analysis = service.analyze_image("https://example.com/logo.png", View::Size).await?;
//! println!("{}x{}", analysis.width, analysis.height);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod collector;
pub mod fetch;
pub mod gate;
pub mod host;
pub mod imaging;
pub mod pipeline;
pub mod render;
pub mod server;

pub use collector::ClickableRegion;
pub use gate::{AdmissionGate, AdmissionPermit};
pub use imaging::PixelMatrix;
pub use pipeline::Service;

/// Configuration for the service
///
/// Defaults are conservative: four concurrent heavy operations, a 4 megapixel
/// ceiling, and a 15 second navigation budget.
///
/// # Examples
///
/// ```
/// let cfg = rfpixels::ServiceConfig::default();
/// assert_eq!(cfg.max_concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Simultaneous fetch/decode/render operations
    pub max_concurrency: usize,
    /// Largest accepted `width * height`
    pub max_pixels: u64,
    /// Browser viewport used for page renders
    pub viewport: Viewport,
    /// Navigation timeout in milliseconds
    pub navigation_timeout_ms: u64,
    /// Quiet period after the load event before capture, in milliseconds
    pub settle_ms: u64,
    /// Upstream fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Largest accepted upstream body
    pub max_fetch_bytes: usize,
    /// User agent for fetches and renders
    pub user_agent: String,
    /// Run Chrome with its sandbox (disable only inside containers that lack it)
    pub browser_sandbox: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_pixels: 4_000_000,
            viewport: Viewport::default(),
            navigation_timeout_ms: 15_000,
            settle_ms: 500,
            fetch_timeout_ms: 15_000,
            max_fetch_bytes: 32 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) RFOX-Pixels/0.1".to_string(),
            browser_sandbox: true,
        }
    }
}

impl ServiceConfig {
    /// Reject values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        if self.max_pixels == 0 {
            return Err(Error::Config("max_pixels must be at least 1".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::Config("viewport dimensions must be non-zero".into()));
        }
        if self.navigation_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
