//! HTTP server exposing the metrics endpoint
//!
//! Two routes: `/metrics` with the text exposition and an informational
//! index page at `/`. The scrape path only takes the cache's read lock and
//! renders; it never waits on a refresh.

use crate::cache::SnapshotCache;
use crate::exposition;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Content type of the Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const INDEX_PAGE: &str = "<html>\
    <head><title>Mihomo Exporter</title></head>\
    <body>\
    <h1>Mihomo Exporter</h1>\
    <p><a href='/metrics'>Metrics</a></p>\
    </body>\
    </html>";

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub metric_prefix: Arc<str>,
}

/// Build the exporter's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until the shutdown token fires, then stop accepting and drain.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let snapshots = state.cache.snapshot();
    match exposition::render(&state.metric_prefix, &snapshots) {
        Ok(body) => ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("failed to encode metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
