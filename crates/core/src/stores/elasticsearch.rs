use crate::error::StoreError;
use crate::query::StoreQuery;
use crate::store::{StoreHit, PATH_FIELD, WORDS_FIELD};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "elasticsearch";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PATH_SCAN_PAGE: usize = 500;
/// Default `index.max_result_window`; `from + size` may not go past it.
const MAX_RESULT_WINDOW: usize = 10_000;

/// Elasticsearch / OpenSearch over the REST API.
///
/// Searches are bounded by the timeout passed per call; every other request by the store's
/// request timeout.
pub struct ElasticsearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    request_timeout: Duration,
}

impl ElasticsearchStore {
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self::with_client(Arc::new(Client::new()), endpoint, index_name)
    }

    pub fn with_client(
        client: Arc<Client>,
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Creates the index with signature mappings unless it already exists.
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .head(self.index_url())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&index_definition())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("index setup failed with {}", response.status()),
            });
        }

        Ok(())
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }

    async fn run_search(&self, body: &Value, timeout: Duration) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(StoreError::from_transport)?;
        read_json(response).await
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn search(
        &self,
        query: &StoreQuery,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let body = search_body(query, limit, timeout);
        let response = self.run_search(&body, timeout).await?;
        let hits = parse_hits(&response)?;
        debug!(index = %self.index_name, hits = hits.len(), "overlap search finished");
        Ok(hits)
    }

    async fn index(&self, document: &Value, refresh: bool) -> Result<String, StoreError> {
        let response = self
            .client
            .post(format!("{}/_doc", self.index_url()))
            .query(&[("refresh", refresh.to_string())])
            .json(document)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        let response_json = read_json(response).await?;
        response_json
            .pointer("/_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "index response without _id".to_string(),
            })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(format!("{}/_doc/{}", self.index_url(), id))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            status => Err(backend_error(status)),
        }
    }

    async fn find_by_path(&self, path: &str) -> Result<Vec<StoreHit>, StoreError> {
        let mut hits = Vec::new();
        loop {
            let body = path_scan_body(path, hits.len());
            let response = self.run_search(&body, self.request_timeout).await?;
            let page = parse_hits(&response)?;
            let page_len = page.len();
            hits.extend(page);

            if !scan_continues(&response, page_len, hits.len())? {
                break;
            }
        }

        debug!(index = %self.index_name, path, hits = hits.len(), "path scan finished");
        Ok(hits)
    }
}

fn search_body(query: &StoreQuery, limit: usize, timeout: Duration) -> Value {
    let mut body = query.to_body();
    body["size"] = json!(limit);
    body["timeout"] = json!(format!("{}ms", timeout.as_millis()));
    body
}

/// One page of the exact-path lookup, in index order so `from` offsets stay stable.
fn path_scan_body(path: &str, from: usize) -> Value {
    json!({
        "from": from,
        "size": PATH_SCAN_PAGE,
        "sort": ["_doc"],
        "track_total_hits": true,
        "query": {
            "bool": {
                "should": [
                    { "term": { PATH_FIELD: path } },
                    { "match_phrase": { PATH_FIELD: path } }
                ],
                "minimum_should_match": 1
            }
        },
        "_source": { "excludes": [WORDS_FIELD] }
    })
}

/// Decides whether the path scan needs another page. Running into the result window with
/// matches left over is an error, never a silently shortened list.
fn scan_continues(response: &Value, page_len: usize, collected: usize) -> Result<bool, StoreError> {
    let total = total_hits(response);
    if page_len < PATH_SCAN_PAGE || total.is_some_and(|total| total <= collected) {
        return Ok(false);
    }

    if collected + PATH_SCAN_PAGE > MAX_RESULT_WINDOW {
        return Err(StoreError::Truncated(format!(
            "path scan stopped at {collected} of {} matches",
            total.map_or_else(|| "unknown".to_string(), |total| total.to_string())
        )));
    }

    Ok(true)
}

/// `hits.total` as an object (`{"value": n}`, 7.x and later) or a bare number (6.x).
fn total_hits(response: &Value) -> Option<usize> {
    let total = response.pointer("/hits/total")?;
    total
        .get("value")
        .unwrap_or(total)
        .as_u64()
        .and_then(|total| usize::try_from(total).ok())
}

async fn read_json(response: Response) -> Result<Value, StoreError> {
    if !response.status().is_success() {
        return Err(backend_error(response.status()));
    }
    Ok(response.json().await?)
}

fn backend_error(status: StatusCode) -> StoreError {
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: status.to_string(),
    }
}

/// Pulls `hits.hits` out of a search response. A timed out search is an error rather than a
/// partial hit list.
pub fn parse_hits(response: &Value) -> Result<Vec<StoreHit>, StoreError> {
    if response.get("timed_out").and_then(Value::as_bool) == Some(true) {
        return Err(StoreError::Timeout("search reported timed_out".to_string()));
    }

    let raw_hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::MalformedHit("response has no hits.hits".to_string()))?;

    raw_hits
        .iter()
        .map(|raw| {
            let id = raw
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::MalformedHit("hit without _id".to_string()))?
                .to_string();
            let score = raw.get("_score").and_then(Value::as_f64).unwrap_or(0.0);
            let source = raw.get("_source").cloned().unwrap_or(Value::Null);
            Ok(StoreHit { id, score, source })
        })
        .collect()
}

fn index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0
        },
        "mappings": {
            "properties": {
                WORDS_FIELD: {"type": "text", "analyzer": "whitespace"},
                PATH_FIELD: {"type": "keyword"},
                "signature": {"type": "long", "index": false},
                "metadata": {"type": "object", "dynamic": true},
                "timestamp": {"type": "date"}
            }
        }
    })
}
