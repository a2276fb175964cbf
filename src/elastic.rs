//! Elasticsearch query helpers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

/// Cluster settings, usually deserialized straight out of
/// [`Settings::get`](crate::config::Settings::get).
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticConfig {
    pub nodes: Vec<String>,
}

/// A single search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    took: i64,
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    total: TotalHits,
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: i64,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: i64,
}

/// Thin search/count client over the Elasticsearch REST API.
///
/// Requests round-robin across the configured nodes.
pub struct ElasticClient {
    nodes: Vec<String>,
    http: Client,
    cursor: AtomicUsize,
}

impl ElasticClient {
    pub fn new(config: &ElasticConfig) -> Result<Self> {
        if config.nodes.is_empty() {
            bail!("no elasticsearch nodes configured");
        }
        Ok(Self {
            nodes: config
                .nodes
                .iter()
                .map(|node| node.trim_end_matches('/').to_string())
                .collect(),
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .context("failed to build http client")?,
            cursor: AtomicUsize::new(0),
        })
    }

    fn next_node(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.nodes[i % self.nodes.len()]
    }

    /// Run a query against `index`, sorted by `sort_by`, returning the page
    /// `[from, from + size)` of hits. An empty result is not an error.
    pub async fn search(
        &self,
        index: &str,
        query: &Value,
        sort_by: &str,
        ascending: bool,
        from: i64,
        size: i64,
    ) -> Result<Vec<SearchHit>> {
        let order = if ascending { "asc" } else { "desc" };
        let mut sort_clause = serde_json::Map::new();
        sort_clause.insert(sort_by.to_string(), json!({ "order": order }));
        let body = json!({
            "query": query,
            "from": from,
            "size": size,
            "sort": [sort_clause],
        });

        let url = format!("{}/{}/_search", self.next_node(), index);
        debug!(%url, "executing search");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("search request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("search request to {url} returned {status}: {detail}");
        }

        let result: SearchResponse = response
            .json()
            .await
            .context("failed to parse search response")?;

        if result.hits.hits.is_empty() {
            info!(index, "search produced no hits");
            return Ok(Vec::new());
        }

        info!(
            index,
            hits = result.hits.total.value,
            took_ms = result.took,
            "search produced hits"
        );
        Ok(result.hits.hits)
    }

    /// Count the documents in `index` matching `query`.
    pub async fn count(&self, index: &str, query: &Value) -> Result<i64> {
        let body = json!({ "query": query });
        let url = format!("{}/{}/_count", self.next_node(), index);
        debug!(%url, "executing count");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("count request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("count request to {url} returned {status}: {detail}");
        }

        let result: CountResponse = response
            .json()
            .await
            .context("failed to parse count response")?;
        Ok(result.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_node_list_is_rejected() {
        let config = ElasticConfig { nodes: Vec::new() };
        assert!(ElasticClient::new(&config).is_err());
    }

    #[test]
    fn nodes_cycle_round_robin() {
        let config = ElasticConfig {
            nodes: vec![
                "http://127.0.0.1:9200/".to_string(),
                "http://127.0.0.2:9200".to_string(),
            ],
        };
        let client = ElasticClient::new(&config).unwrap();
        assert_eq!(client.next_node(), "http://127.0.0.1:9200");
        assert_eq!(client.next_node(), "http://127.0.0.2:9200");
        assert_eq!(client.next_node(), "http://127.0.0.1:9200");
    }

    #[test]
    fn search_response_deserializes() {
        let raw = r#"{
            "took": 12,
            "timed_out": false,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "max_score": null,
                "hits": [
                    {"_index": "messages", "_id": "m-1", "_score": null,
                     "_source": {"text": "hello"}, "sort": [1]},
                    {"_index": "messages", "_id": "m-2", "_score": null,
                     "_source": {"text": "world"}, "sort": [2]}
                ]
            }
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.took, 12);
        assert_eq!(response.hits.total.value, 2);
        assert_eq!(response.hits.hits.len(), 2);
        assert_eq!(response.hits.hits[0].id, "m-1");
        assert_eq!(response.hits.hits[0].source["text"], "hello");
        assert!(response.hits.hits[0].score.is_none());
    }

    #[test]
    fn count_response_deserializes() {
        let raw = r#"{"count": 42, "_shards": {"total": 1, "successful": 1}}"#;
        let response: CountResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.count, 42);
    }
}
