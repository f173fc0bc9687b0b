//! Page rendering through an external browser.
//!
//! Backends implement the blocking [`PageRenderer`] trait; [`render_page`]
//! runs one render on a dedicated worker thread so async handlers never block
//! the runtime while a browser loads.

pub mod cdp;

pub use cdp::CdpRenderer;

use crate::collector::ClickableRegion;
use crate::gate::AdmissionPermit;
use crate::{Error, Result};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use url::Url;

/// What a single render should produce besides the screenshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderRequest {
    /// Run the clickable-region collector before capturing.
    pub collect_links: bool,
}

/// Output of one render pass.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Full-page PNG capture.
    pub screenshot: Vec<u8>,
    /// Empty unless links were requested.
    pub links: Vec<ClickableRegion>,
}

/// A browser backend. Each call owns its browser for the duration of the call
/// and must release it before returning, whether or not the render succeeded.
pub trait PageRenderer: Send + Sync {
    fn render(&self, target: &Url, request: RenderRequest) -> Result<RenderedPage>;
}

/// Render `target` on a worker thread and await the result.
///
/// The worker owns `permit` while the browser runs and hands it back with the
/// page. If the caller stops waiting, the slot is freed only once the worker
/// has finished and torn its browser down.
pub async fn render_page(
    renderer: Arc<dyn PageRenderer>,
    target: Url,
    request: RenderRequest,
    permit: AdmissionPermit,
) -> Result<(RenderedPage, AdmissionPermit)> {
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("rfpixels-render".into())
        .spawn(move || {
            let res = renderer.render(&target, request);
            // Receiver gone means the request was dropped; the permit drops with the unsent reply.
            let _ = tx.send((res, permit));
        })
        .map_err(|e| Error::Internal(format!("Failed to spawn render worker: {}", e)))?;

    let (res, permit) = rx
        .await
        .map_err(|e| Error::Internal(format!("Render worker canceled: {}", e)))?;
    Ok((res?, permit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AdmissionGate;
    use std::time::Duration;

    struct Fixed;

    impl PageRenderer for Fixed {
        fn render(&self, target: &Url, _request: RenderRequest) -> Result<RenderedPage> {
            if target.path() == "/fail" {
                return Err(Error::NavigationTimeout(15000));
            }
            Ok(RenderedPage { screenshot: vec![1, 2, 3], links: Vec::new() })
        }
    }

    struct Panics;

    impl PageRenderer for Panics {
        fn render(&self, _target: &Url, _request: RenderRequest) -> Result<RenderedPage> {
            panic!("backend bug");
        }
    }

    struct Slow;

    impl PageRenderer for Slow {
        fn render(&self, _target: &Url, _request: RenderRequest) -> Result<RenderedPage> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(RenderedPage { screenshot: Vec::new(), links: Vec::new() })
        }
    }

    #[tokio::test]
    async fn result_is_delivered_from_worker() {
        let gate = AdmissionGate::new(1).unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let permit = gate.acquire().await.unwrap();
        let (page, permit) = render_page(Arc::new(Fixed), url, RenderRequest::default(), permit).await.unwrap();
        assert_eq!(page.screenshot, vec![1, 2, 3]);
        assert_eq!(gate.in_use(), 1);
        drop(permit);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let gate = AdmissionGate::new(1).unwrap();
        let url = Url::parse("https://example.com/fail").unwrap();
        let permit = gate.acquire().await.unwrap();
        let err = render_page(Arc::new(Fixed), url, RenderRequest::default(), permit).await.unwrap_err();
        assert!(matches!(err, Error::NavigationTimeout(15000)));
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn worker_panic_becomes_internal_error() {
        let gate = AdmissionGate::new(1).unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let permit = gate.acquire().await.unwrap();
        let err = render_page(Arc::new(Panics), url, RenderRequest::default(), permit).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn abandoned_render_keeps_its_slot_until_done() {
        let gate = AdmissionGate::new(1).unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let permit = gate.acquire().await.unwrap();

        let pending = render_page(Arc::new(Slow), url, RenderRequest::default(), permit);
        assert!(tokio::time::timeout(Duration::from_millis(30), pending).await.is_err());

        assert_eq!(gate.in_use(), 1);
        assert!(gate.try_acquire().is_none());

        let next = tokio::time::timeout(Duration::from_secs(5), gate.acquire()).await;
        assert!(next.is_ok(), "slot should come back once the worker finishes");
    }
}
