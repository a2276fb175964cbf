//! Minimal JSON API server with response-header plumbing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{MethodRouter, get},
};
use parking_lot::Mutex;
use tokio::signal;
use tracing::{debug, info, warn};

/// Response headers a handler can set while the request is in flight.
///
/// The server inserts one of these as a request extension; handlers extract
/// it with `Extension<ResponseHeaders>` and call [`set`](Self::set). After
/// the handler returns, every entry is copied onto the response.
#[derive(Clone, Default)]
pub struct ResponseHeaders {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl ResponseHeaders {
    /// Set a header on the eventual response. Later writes to the same key
    /// win.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    fn drain(&self) -> HashMap<String, String> {
        std::mem::take(&mut *self.entries.lock())
    }
}

/// A prefix-scoped router that serves JSON APIs.
///
/// Every route gets request logging and the [`ResponseHeaders`] extension;
/// a `/health` endpoint is always mounted at the root, outside the prefix.
pub struct ApiServer {
    host: String,
    port: u16,
    prefix: String,
    routes: Router,
}

impl ApiServer {
    pub fn new(host: impl Into<String>, port: u16, prefix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            prefix: normalize_prefix(prefix.into()),
            routes: Router::new(),
        }
    }

    /// Register a handler under the server's prefix.
    pub fn route(mut self, path: &str, handler: MethodRouter) -> Self {
        debug!(prefix = %self.prefix, path, "mapping handler");
        self.routes = self.routes.route(path, handler);
        self
    }

    /// Build the final router, for serving or for embedding elsewhere.
    pub fn into_router(self) -> Router {
        let api = self
            .routes
            .layer(middleware::from_fn(propagate_headers));
        let app = if self.prefix.is_empty() {
            api
        } else {
            Router::new().nest(&self.prefix, api)
        };
        app.route("/health", get(health_check))
            .layer(middleware::from_fn(log_request))
    }

    /// Bind and serve until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let app = self.into_router();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "http server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("http server exited")?;

        info!("http server stopped");
        Ok(())
    }
}

/// Ensure a leading slash and strip trailing ones; `"/"` means no prefix.
fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "unable to listen for shutdown signal"),
    }
}

/// Log every request with its status and elapsed time.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    info!(%method, %path, "request received");

    let response = next.run(req).await;

    info!(
        %method,
        %path,
        status = %response.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request finished"
    );
    response
}

/// Give the handler a [`ResponseHeaders`] handle and copy whatever it set
/// onto the response afterwards.
async fn propagate_headers(mut req: Request, next: Next) -> Response {
    let headers = ResponseHeaders::default();
    req.extensions_mut().insert(headers.clone());

    let mut response = next.run(req).await;

    for (key, value) in headers.drain() {
        match (
            HeaderName::try_from(key.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %key, "dropping invalid response header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Json};

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("api".to_string()), "/api");
        assert_eq!(normalize_prefix("/api/".to_string()), "/api");
        assert_eq!(normalize_prefix("/".to_string()), "");
        assert_eq!(normalize_prefix(String::new()), "");
    }

    #[test]
    fn response_headers_last_write_wins() {
        let headers = ResponseHeaders::default();
        headers.set("x-tag", "one");
        headers.set("x-tag", "two");
        let drained = headers.drain();
        assert_eq!(drained.get("x-tag").map(String::as_str), Some("two"));
        assert!(headers.drain().is_empty());
    }

    async fn hello(Extension(headers): Extension<ResponseHeaders>) -> Json<serde_json::Value> {
        headers.set("x-request-source", "svckit");
        headers.set("not a header name", "dropped");
        Json(serde_json::json!({"message": "hello"}))
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn handler_headers_reach_the_response() {
        let app = ApiServer::new("127.0.0.1", 0, "/api")
            .route("/hello", get(hello))
            .into_router();
        let base = spawn(app).await;

        let response = reqwest::get(format!("{base}/api/hello")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response
                .headers()
                .get("x-request-source")
                .and_then(|v| v.to_str().ok()),
            Some("svckit")
        );
        assert!(response.headers().get("not a header name").is_none());

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "hello");
    }

    #[tokio::test]
    async fn health_lives_outside_the_prefix() {
        let app = ApiServer::new("127.0.0.1", 0, "/api")
            .route("/hello", get(hello))
            .into_router();
        let base = spawn(app).await;

        let response = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK");

        let missing = reqwest::get(format!("{base}/hello")).await.unwrap();
        assert_eq!(missing.status(), 404);
    }
}
