//! HTTP surface.
//!
//! JSON routes answer `{success: true, ...}` or `{success: false, message}`
//! with 400; PNG routes answer raw bytes or a plain-text 400. Errors outside
//! the caller-facing taxonomy, and handler panics, become a bare 500.

use crate::pipeline::{Analysis, Service, View};
use crate::{ClickableRegion, Error, PixelMatrix, Result};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;

#[derive(Debug, Deserialize)]
struct SrcQuery {
    src: Option<String>,
}

#[derive(Clone, Copy)]
enum Kind {
    Image,
    Html,
}

#[derive(Serialize)]
struct Success {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    colors: Option<PixelMatrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Vec<ClickableRegion>>,
}

/// Build the router with all routes.
pub fn build_router(service: Service) -> Router {
    Router::new()
        .route("/image", get(image_full))
        .route("/image/size", get(image_size))
        .route("/image/converttopng", get(image_png))
        .route("/html", get(html_full))
        .route("/html/size", get(html_size))
        .route("/html/colors", get(html_colors))
        .route("/html/links", get(html_links))
        .route("/html/converttopng", get(html_png))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(service)
        .layer(CatchPanicLayer::custom(panic_response))
}

/// Handle to a running server; dropping it leaves the server running.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Server task failed: {}", e)))?
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))
    }
}

/// Bind `addr` (port 0 picks a free port) and serve in the background.
pub async fn start(addr: SocketAddr, service: Service) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| Error::Config(format!("Failed to read bound address: {}", e)))?;

    let (tx, rx) = oneshot::channel::<()>();
    let router = build_router(service);
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
    });

    info!("listening on {}", local_addr);
    Ok(ServerHandle { addr: local_addr, shutdown: tx, task })
}

async fn image_full(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Image, q.src, View::Full).await
}

async fn image_size(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Image, q.src, View::Size).await
}

async fn image_png(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    png_view(&svc, Kind::Image, q.src).await
}

async fn html_full(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Html, q.src, View::Full).await
}

async fn html_size(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Html, q.src, View::Size).await
}

async fn html_colors(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Html, q.src, View::Colors).await
}

async fn html_links(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    json_view(&svc, Kind::Html, q.src, View::Links).await
}

async fn html_png(State(svc): State<Service>, Query(q): Query<SrcQuery>) -> Response {
    png_view(&svc, Kind::Html, q.src).await
}

async fn health(State(svc): State<Service>) -> Response {
    let gate = svc.gate();
    Json(json!({ "status": "ok", "capacity": gate.capacity(), "inUse": gate.in_use() })).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response()
}

async fn run(svc: &Service, kind: Kind, src: Option<String>, view: View) -> Result<Analysis> {
    let src = src
        .filter(|s| !s.trim().is_empty())
        .ok_or(Error::MissingParameter("src"))?;
    match kind {
        Kind::Image => svc.analyze_image(&src, view).await,
        Kind::Html => svc.analyze_page(&src, view).await,
    }
}

async fn json_view(svc: &Service, kind: Kind, src: Option<String>, view: View) -> Response {
    let analysis = match run(svc, kind, src, view).await {
        Ok(a) => a,
        Err(e) if e.is_caller_facing() => {
            warn!("request rejected: {}", e);
            let body = json!({ "success": false, "message": e.to_string() });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
        Err(e) => return internal_error(&e),
    };

    let size = match view {
        View::Full | View::Size => Some([analysis.width, analysis.height]),
        _ => None,
    };
    Json(Success { success: true, size, colors: analysis.colors, links: analysis.links }).into_response()
}

async fn png_view(svc: &Service, kind: Kind, src: Option<String>) -> Response {
    match run(svc, kind, src, View::Png).await {
        Ok(Analysis { png: Some(png), .. }) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(_) => internal_error(&Error::Internal("PNG view produced no bytes".into())),
        Err(e) if e.is_caller_facing() => {
            warn!("request rejected: {}", e);
            (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], e.to_string())
                .into_response()
        }
        Err(e) => internal_error(&e),
    }
}

fn internal_error(err: &Error) -> Response {
    error!("internal error: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal Server Error" }))).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    internal_error(&Error::Internal(format!("handler panicked: {}", detail)))
}
