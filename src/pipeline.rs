//! Request pipelines: gate, validate, acquire bytes, normalize, extract.
//!
//! Every public operation holds one admission slot from before target
//! validation until its result is fully built.

use crate::collector::ClickableRegion;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::gate::{AdmissionGate, AdmissionPermit};
use crate::host::validate_target;
use crate::imaging::{extract, normalize, MetadataGuard, PixelMatrix};
use crate::render::{render_page, CdpRenderer, PageRenderer, RenderRequest};
use crate::{Error, Result, ServiceConfig};
use log::info;
use std::sync::Arc;

/// Which parts of the result a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Size and colors (plus links for pages).
    Full,
    Size,
    Colors,
    Links,
    /// Canonical PNG bytes.
    Png,
}

impl View {
    fn wants_colors(self) -> bool {
        matches!(self, View::Full | View::Colors)
    }
}

/// Products of one pipeline run. Fields not requested by the [`View`] are `None`.
#[derive(Debug)]
pub struct Analysis {
    pub width: u32,
    pub height: u32,
    pub colors: Option<PixelMatrix>,
    pub png: Option<Vec<u8>>,
    pub links: Option<Vec<ClickableRegion>>,
}

/// Shared handle to the gate and collaborators. Cheap to clone.
#[derive(Clone)]
pub struct Service {
    gate: AdmissionGate,
    guard: MetadataGuard,
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn PageRenderer>,
}

impl Service {
    /// Production service: `reqwest` fetcher and headless Chrome renderer.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config)?);
        let renderer = Arc::new(CdpRenderer::new(config));
        Self::with_backends(config, fetcher, renderer)
    }

    /// Service over caller-supplied collaborators.
    pub fn with_backends(
        config: &ServiceConfig,
        fetcher: Arc<dyn Fetcher>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gate: AdmissionGate::new(config.max_concurrency)?,
            guard: MetadataGuard::new(config.max_pixels),
            fetcher,
            renderer,
        })
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Fetch an image URL and analyze it.
    pub async fn analyze_image(&self, src: &str, view: View) -> Result<Analysis> {
        let permit = self.gate.acquire().await?;
        let url = validate_target(src)?;
        info!("image {} ({:?})", url, view);

        let bytes = self.fetcher.fetch(&url).await?;
        self.process(bytes, view, permit).await
    }

    /// Render a page URL and analyze its screenshot.
    pub async fn analyze_page(&self, src: &str, view: View) -> Result<Analysis> {
        let permit = self.gate.acquire().await?;
        let url = validate_target(src)?;
        info!("html {} ({:?})", url, view);

        let request = RenderRequest { collect_links: matches!(view, View::Full | View::Links) };
        let (page, permit) = render_page(Arc::clone(&self.renderer), url, request, permit).await?;

        if view == View::Links {
            let (width, height) = self.guard.probe(&page.screenshot)?;
            return Ok(Analysis { width, height, colors: None, png: None, links: Some(page.links) });
        }

        let mut analysis = self.process(page.screenshot, view, permit).await?;
        if request.collect_links {
            analysis.links = Some(page.links);
        }
        Ok(analysis)
    }

    /// Decode and extract on the blocking pool. The permit moves with the
    /// work, so a dropped request cannot free the slot early.
    async fn process(&self, bytes: Vec<u8>, view: View, permit: AdmissionPermit) -> Result<Analysis> {
        let guard = self.guard;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let asset = normalize(&bytes, &guard)?;
            let (width, height) = guard.check(asset.width(), asset.height())?;

            let colors = if view.wants_colors() { Some(extract(asset.raw(), width, height)?) } else { None };
            let png = if view == View::Png { Some(asset.to_png()?) } else { None };

            Ok(Analysis { width, height, colors, png, links: None })
        })
        .await
        .map_err(|e| Error::Internal(format!("Image worker failed: {}", e)))?
    }
}
