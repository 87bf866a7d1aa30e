//! In-process mock of the mihomo management API for integration tests
//!
//! Serves the four endpoints the exporter consumes, with per-endpoint
//! replies that tests can swap at runtime to simulate failures. The
//! `/traffic` endpoint streams its configured frames and then hangs,
//! mimicking the daemon's endless feed.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned reply for one endpoint.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(String),
    Status(u16),
}

impl Reply {
    pub fn json(body: impl Into<String>) -> Self {
        Self::Json(body.into())
    }

    fn into_response(self) -> Response {
        match self {
            Self::Json(body) => {
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            Self::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockState {
    /// When set, requests must carry `Authorization: Bearer <token>`.
    pub required_token: Option<String>,
    pub connections: Arc<Mutex<Reply>>,
    pub proxies: Arc<Mutex<Reply>>,
    /// Per-proxy delay replies; unknown names answer 404.
    pub delays: Arc<Mutex<HashMap<String, Reply>>>,
    /// JSON frames streamed by `/traffic` before the stream hangs.
    pub traffic_frames: Arc<Mutex<Vec<String>>>,
}

impl Default for Reply {
    fn default() -> Self {
        Self::Status(404)
    }
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub state: MockState,
    handle: JoinHandle<()>,
}

impl MockApi {
    /// Bind to an ephemeral port and serve until dropped.
    pub async fn start(state: MockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/connections", get(connections))
            .route("/traffic", get(traffic))
            .route("/proxies", get(proxies))
            .route("/proxies/{name}/delay", get(delay))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn check_auth(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(token) = &state.required_token else {
        return Ok(());
    };
    let expected = format!("Bearer {token}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if authorized {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED.into_response())
    }
}

async fn connections(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(denied) = check_auth(&state, &headers) {
        return denied;
    }
    state.connections.lock().unwrap().clone().into_response()
}

async fn proxies(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(denied) = check_auth(&state, &headers) {
        return denied;
    }
    state.proxies.lock().unwrap().clone().into_response()
}

async fn traffic(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(denied) = check_auth(&state, &headers) {
        return denied;
    }
    let frames = state.traffic_frames.lock().unwrap().clone();
    let body = futures::stream::iter(
        frames
            .into_iter()
            .map(|frame| Ok::<Bytes, Infallible>(Bytes::from(frame))),
    )
    .chain(futures::stream::pending());
    Body::from_stream(body).into_response()
}

async fn delay(
    State(state): State<MockState>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = check_auth(&state, &headers) {
        return denied;
    }
    // The daemon requires both probe parameters.
    if !params.contains_key("url") || !params.contains_key("timeout") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match state.delays.lock().unwrap().get(&name) {
        Some(reply) => reply.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
