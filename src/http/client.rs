//! Request helpers over a shared `reqwest` client

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

static HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
});

/// Send a GET request with the given query parameters and return the raw
/// response body.
pub async fn get(url: &str, query: &HashMap<String, String>) -> Result<Vec<u8>> {
    let started = Instant::now();
    debug!(url, "sending GET request");

    let response = match HTTP.get(url).query(query).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url, error = %e, "GET request failed");
            return Err(anyhow!("GET {url} failed: {e}"));
        }
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            error!(url, error = %e, "failed to read response body");
            return Err(anyhow!("failed to read response body from {url}: {e}"));
        }
    };

    debug!(
        url,
        %status,
        bytes = body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "GET request finished"
    );
    Ok(body.to_vec())
}

/// POST `body` as JSON with optional extra headers and return the raw
/// response body. `Content-Type: application/json` is set automatically.
pub async fn post_json<T>(
    url: &str,
    body: &T,
    headers: &HashMap<String, String>,
) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let started = Instant::now();
    debug!(url, "sending POST request");

    let mut request = HTTP.post(url).json(body);
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url, error = %e, "POST request failed");
            return Err(anyhow!("POST {url} failed: {e}"));
        }
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            error!(url, error = %e, "failed to read response body");
            return Err(anyhow!("failed to read response body from {url}: {e}"));
        }
    };

    debug!(
        url,
        %status,
        bytes = body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "POST request finished"
    );
    Ok(body.to_vec())
}
