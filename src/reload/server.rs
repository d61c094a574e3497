// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Development server
//!
//! Serves a static root or proxies an existing site, injecting the reload
//! client into HTML responses. Browsers long-poll `/__assetflow/poll` for
//! [`ReloadBatch`]es.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::{ReloadBatch, ReloadHub, CLIENT_SCRIPT};
use crate::errors::AssetflowError;
use crate::files::is_contained;

const CLIENT_PATH: &str = "/__assetflow/client.js";
const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Where page content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeMode {
    /// Files below a directory
    Static(PathBuf),
    /// Another HTTP server, e.g. `http://local.domain.com`
    Proxy(String),
}

struct ServerState {
    hub: ReloadHub,
    mode: ServeMode,
    client: reqwest::Client,
}

/// HTTP dev server with live reload
pub struct DevServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    since: Option<u64>,
}

impl DevServer {
    pub fn new(addr: SocketAddr, mode: ServeMode, hub: ReloadHub) -> Result<Self, AssetflowError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AssetflowError::Server {
                message: format!("Could not create proxy client: {}", e),
            })?;

        Ok(Self {
            addr,
            state: Arc::new(ServerState { hub, mode, client }),
        })
    }

    /// Routes served by the dev server
    pub fn router(&self) -> Router {
        Router::new()
            .route(CLIENT_PATH, get(client_script))
            .route("/__assetflow/poll", get(poll))
            .fallback(content)
            .with_state(self.state.clone())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, AssetflowError> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|e| AssetflowError::Server {
                message: format!("Could not bind {}: {}", self.addr, e),
            })
    }

    /// Bind the configured address and serve until the task is dropped
    pub async fn serve(self) -> Result<(), AssetflowError> {
        let listener = self.bind().await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), AssetflowError> {
        if let Ok(addr) = listener.local_addr() {
            info!("dev server listening on http://{}", addr);
        }

        axum::serve(listener, self.router())
            .await
            .map_err(|e| AssetflowError::Server {
                message: e.to_string(),
            })
    }
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn poll(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PollQuery>,
) -> Json<ReloadBatch> {
    let Some(since) = query.since else {
        return Json(state.hub.since(state.hub.version()));
    };

    if tokio::time::timeout(POLL_TIMEOUT, state.hub.wait_past(since))
        .await
        .is_err()
    {
        debug!(since, "poll timed out");
    }

    Json(state.hub.since(since))
}

async fn content(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    match &state.mode {
        ServeMode::Static(root) => serve_static(root, uri.path()).await,
        ServeMode::Proxy(target) => serve_proxy(&state.client, target, &uri).await,
    }
}

async fn serve_static(root: &Path, request_path: &str) -> Response {
    let relative = PathBuf::from(request_path.trim_start_matches('/'));
    if !is_contained(&relative) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut path = root.join(&relative);
    if path.is_dir() {
        path = path.join("index.html");
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = content_type_for(&path);
            let body = if content_type.starts_with("text/html") {
                inject_client(&String::from_utf8_lossy(&bytes)).into_bytes()
            } else {
                bytes
            };
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_proxy(client: &reqwest::Client, target: &str, uri: &Uri) -> Response {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{}", target.trim_end_matches('/'), path);

    let upstream = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = %url, error = %e, "proxy request failed");
            return (StatusCode::BAD_GATEWAY, format!("Proxy error: {}", e)).into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = match upstream.bytes().await {
        Ok(b) => b.to_vec(),
        Err(e) => {
            return (StatusCode::BAD_GATEWAY, format!("Proxy error: {}", e)).into_response();
        }
    };

    let body = if content_type.starts_with("text/html") {
        inject_client(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Ok(value) = header::HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// Insert the reload client before `</body>`, or append it
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", CLIENT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tag, &html[idx..]),
        None => format!("{}{}", html, tag),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
