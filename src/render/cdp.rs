//! Chrome DevTools Protocol renderer (uses the `headless_chrome` crate)

use super::{PageRenderer, RenderRequest, RenderedPage};
use crate::collector::{self, script, ClickableRegion};
use crate::{Error, Result, ServiceConfig, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Launches a fresh headless Chrome for every render. No pooling: each
/// request gets a clean profile and process.
///
/// "Settled" means the load event fired and the count of finished resource
/// fetches then stayed unchanged for `settle_ms`. Requests still in flight are
/// invisible to that count, so a single very slow fetch can be missed. A page
/// that never goes quiet within the navigation timeout fails with
/// [`Error::NavigationTimeout`].
#[derive(Debug, Clone)]
pub struct CdpRenderer {
    viewport: Viewport,
    user_agent: String,
    navigation_timeout_ms: u64,
    settle_ms: u64,
    sandbox: bool,
}

impl CdpRenderer {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            viewport: config.viewport,
            user_agent: config.user_agent.clone(),
            navigation_timeout_ms: config.navigation_timeout_ms,
            settle_ms: config.settle_ms,
            sandbox: config.browser_sandbox,
        }
    }

    fn launch(&self) -> Result<RenderSession> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .window_size(Some((self.viewport.width, self.viewport.height)))
            .idle_browser_timeout(Duration::from_millis(self.navigation_timeout_ms.max(30_000) * 2))
            .build()
            .map_err(|e| Error::NavigationFailed(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::NavigationFailed(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::NavigationFailed(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(self.navigation_timeout_ms));
        tab.set_user_agent(&self.user_agent, None, None)
            .map_err(|e| Error::NavigationFailed(format!("Failed to set user agent: {}", e)))?;

        debug!("browser launched ({}x{})", self.viewport.width, self.viewport.height);
        Ok(RenderSession { _browser: browser, tab })
    }

    /// Poll page activity until it is unchanged for `settle_ms`, bounded by
    /// the navigation timeout counted from `started`.
    fn wait_for_quiet(&self, session: &RenderSession, started: Instant) -> Result<()> {
        let budget = Duration::from_millis(self.navigation_timeout_ms);
        let mut tracker = QuietTracker::new(Duration::from_millis(self.settle_ms), Instant::now());
        loop {
            let sample = match session
                .evaluate_string(script::ACTIVITY_SCRIPT)
                .and_then(|json| script::parse_activity(&json))
            {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("activity probe failed, falling back to a fixed settle: {}", e);
                    std::thread::sleep(Duration::from_millis(self.settle_ms));
                    return Ok(());
                }
            };
            let now = Instant::now();
            if tracker.observe(sample, now) {
                debug!("network quiet after {:?}", now.duration_since(started));
                return Ok(());
            }
            if now.duration_since(started) >= budget {
                return Err(Error::NavigationTimeout(self.navigation_timeout_ms));
            }
            std::thread::sleep(QUIET_POLL);
        }
    }

    fn navigation_error(&self, err: anyhow::Error) -> Error {
        if err.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
            Error::NavigationTimeout(self.navigation_timeout_ms)
        } else {
            Error::NavigationFailed(err.to_string())
        }
    }
}

impl PageRenderer for CdpRenderer {
    fn render(&self, target: &Url, request: RenderRequest) -> Result<RenderedPage> {
        // Dropping the session on any return path closes the tab and kills Chrome.
        let session = self.launch()?;

        let started = Instant::now();
        session
            .tab
            .navigate_to(target.as_str())
            .map_err(|e| self.navigation_error(e))?;
        session
            .tab
            .wait_until_navigated()
            .map_err(|e| self.navigation_error(e))?;
        self.wait_for_quiet(&session, started)?;

        let links = if request.collect_links { session.collect_links() } else { Vec::new() };
        let screenshot = session.full_page_png(self.viewport)?;

        Ok(RenderedPage { screenshot, links })
    }
}

const QUIET_POLL: Duration = Duration::from_millis(100);

/// Detects when successive activity samples stop changing for `window`.
#[derive(Debug)]
struct QuietTracker {
    window: Duration,
    last: Option<(bool, u64)>,
    since: Instant,
}

impl QuietTracker {
    fn new(window: Duration, now: Instant) -> Self {
        Self { window, last: None, since: now }
    }

    /// Record a `(load_complete, finished_resources)` sample taken at `now`.
    fn observe(&mut self, sample: (bool, u64), now: Instant) -> bool {
        if self.last != Some(sample) {
            self.last = Some(sample);
            self.since = now;
            return false;
        }
        sample.0 && now.duration_since(self.since) >= self.window
    }
}

/// One browser process and its single tab, torn down on drop.
struct RenderSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl RenderSession {
    fn evaluate_string(&self, expression: &str) -> Result<String> {
        let eval = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| Error::NavigationFailed(format!("Evaluation failed: {}", e)))?;

        match eval.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::NavigationFailed("No value returned from evaluation".into())),
        }
    }

    /// Collector failures degrade to an empty list; the screenshot is still useful.
    fn collect_links(&self) -> Vec<ClickableRegion> {
        match self
            .evaluate_string(script::SNAPSHOT_SCRIPT)
            .and_then(|json| script::parse_snapshot(&json))
        {
            Ok(snapshot) => collector::collect(&snapshot),
            Err(e) => {
                warn!("clickable-region collection failed: {}", e);
                Vec::new()
            }
        }
    }

    fn full_page_png(&self, viewport: Viewport) -> Result<Vec<u8>> {
        let (width, height) = self
            .evaluate_string(script::PAGE_SIZE_SCRIPT)
            .and_then(|json| script::parse_page_size(&json))
            .unwrap_or_else(|e| {
                warn!("page size unavailable, capturing viewport only: {}", e);
                (viewport.width, viewport.height)
            });

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(width),
            height: f64::from(height),
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::NavigationFailed(format!("Screenshot failed: {}", e)))
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("tab close during teardown failed: {}", e);
        }
        debug!("browser session torn down");
    }
}
