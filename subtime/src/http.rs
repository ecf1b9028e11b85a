//! HTTP server for the dashboard and per-monitor health endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use crate::page::{PageContext, render_index};
use crate::snapshot::SharedSnapshot;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    snapshot: SharedSnapshot,
    page: Arc<PageContext>,
}

/// Create the HTTP router.
fn create_router(
    snapshot: SharedSnapshot,
    page: PageContext,
    static_dir: Option<PathBuf>,
) -> Router {
    let state = AppState {
        snapshot,
        page: Arc::new(page),
    };

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/monitor/:slug", get(monitor_handler))
        .route("/api/monitors", get(api_handler))
        .route("/health", get(health_handler));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Handler for the dashboard page.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.snapshot.load();
    Html(render_index(&snapshot, &state.page))
}

/// Handler for `/monitor/:slug`.
///
/// Answers `ok` with 200 when the monitor is up. A monitor that is down or
/// has no status yet gets 503, an unknown slug gets 404.
async fn monitor_handler(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let snapshot = state.snapshot.load();

    match snapshot.find_by_slug(&slug) {
        Some(monitor) if monitor.is_up() => (StatusCode::OK, "ok").into_response(),
        Some(monitor) => {
            debug!(monitor = %monitor.name, status = ?monitor.status, "Monitor not up");
            (StatusCode::SERVICE_UNAVAILABLE, "ko").into_response()
        }
        None => (StatusCode::NOT_FOUND, "ko").into_response(),
    }
}

/// Handler for the JSON snapshot.
async fn api_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot.load();
    Json(snapshot.as_ref().clone()).into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    snapshot: SharedSnapshot,
    listen_addr: SocketAddr,
    page: PageContext,
    static_dir: Option<PathBuf>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(snapshot: SharedSnapshot, listen_addr: SocketAddr, page: PageContext) -> Self {
        Self {
            snapshot,
            listen_addr,
            page,
            static_dir: None,
        }
    }

    /// Serve files from `dir` for paths no route matches.
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.snapshot, self.page, self.static_dir);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotCell;
    use axum::body::Body;
    use axum::http::Request;
    use subtime_common::monitor::{Monitor, MonitorStatus};
    use tower::ServiceExt;

    fn page() -> PageContext {
        PageContext {
            source: "http://kuma.local:3001".to_string(),
            poll_interval_secs: 30,
            base_url: "http://localhost:3000".to_string(),
        }
    }

    fn make_snapshot() -> SharedSnapshot {
        let cell = Arc::new(SnapshotCell::new());

        let mut web = Monitor::new("Web Site");
        web.status = Some(MonitorStatus::Up);
        let mut db = Monitor::new("db");
        db.status = Some(MonitorStatus::Down);
        let pending = Monitor::new("pending");

        cell.publish(vec![web, db, pending]);
        cell
    }

    async fn get_response(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_monitor_up() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, body) = get_response(router, "/monitor/web-site").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_monitor_down() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, body) = get_response(router, "/monitor/db").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "ko");
    }

    #[tokio::test]
    async fn test_monitor_without_status_is_unavailable() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, _) = get_response(router, "/monitor/pending").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_monitor_not_found() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, body) = get_response(router, "/monitor/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "ko");
    }

    #[tokio::test]
    async fn test_index_page() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, body) = get_response(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Web Site"));
        assert!(body.contains("http://localhost:3000/monitor/web-site"));
    }

    #[tokio::test]
    async fn test_api_monitors() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, body) = get_response(router, "/api/monitors").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["monitors"].as_array().unwrap().len(), 3);
        assert_eq!(json["monitors"][0]["status"], "UP");
        assert!(json["monitors"][2]["status"].is_null());
        assert!(json["last_error"].is_null());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, _) = get_response(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();

        let router = create_router(make_snapshot(), page(), Some(dir.path().to_path_buf()));

        let (status, body) = get_response(router.clone(), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body{}");

        let (status, _) = get_response(router, "/missing.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_path_without_static_dir() {
        let router = create_router(make_snapshot(), page(), None);
        let (status, _) = get_response(router, "/style.css").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
