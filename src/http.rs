//! HTTP client for the hosted hotspot row store.
//!
//! Talks to a row-store REST API (`/api/v2/tables/{table}/records`) with a token
//! header. Each call is a single request; failures come back as a
//! [`StoreError`] tagged retryable or fatal, and the caller decides what to do.
//!
//! - 429 and 5xx responses, timeouts and connection errors are `Retryable`
//! - every other failure is `Fatal`

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::normalize::ensure_array;
use crate::store::{HotspotDraft, HotspotStore, StoreError};

const TOKEN_HEADER: &str = "xc-token";
const PAGE_LIMIT: u32 = 1000;
const PRIMARY_KEY: &str = "Id";

/// Where the hotspot table lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowStoreConfig {
    pub base_url: String,
    pub table_id: String,
    pub token: String,
}

impl RowStoreConfig {
    fn records_url(&self) -> String {
        format!(
            "{}/api/v2/tables/{}/records",
            self.base_url.trim_end_matches('/'),
            self.table_id
        )
    }
}

/// Async client for the hotspot table.
pub struct RowStoreClient {
    client: Client,
    config: RowStoreConfig,
}

impl RowStoreClient {
    pub fn new(config: RowStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Fatal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub async fn list(&self) -> Result<Vec<Value>, StoreError> {
        let start = Instant::now();
        let request = self
            .client
            .get(self.config.records_url())
            .query(&[("limit", PAGE_LIMIT)]);
        let body = self.send(request).await?;
        let rows = ensure_array(body);
        info!(
            "[RowStoreClient] Listed {} rows in {:?}",
            rows.len(),
            start.elapsed()
        );
        Ok(rows)
    }

    pub async fn create(&self, draft: &HotspotDraft) -> Result<Value, StoreError> {
        draft.validate()?;
        let record = draft.to_record();
        let request = self.client.post(self.config.records_url()).json(&record);
        let created = self.send(request).await?;
        debug!("[RowStoreClient] Created {:?}", created.get(PRIMARY_KEY));
        Ok(merge_key(record, &created))
    }

    pub async fn update(&self, key: &str, draft: &HotspotDraft) -> Result<Value, StoreError> {
        draft.validate()?;
        let record = with_key(draft.to_record(), key);
        let request = self.client.patch(self.config.records_url()).json(&record);
        let updated = self.send(request).await?;
        Ok(merge_key(record, &updated))
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.config.records_url())
            .json(&with_key(json!({}), key));
        self.send(request).await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .header(TOKEN_HEADER, &self.config.token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let err = status_error(status);
            warn!("[RowStoreClient] {}", err);
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Fatal(format!("JSON parse error: {}", e)))
    }
}

/// Blocking wrapper for callers without an async runtime, e.g. the FFI layer
/// or [`Locator::refresh_from`](crate::Locator::refresh_from).
pub struct BlockingRowStore {
    runtime: tokio::runtime::Runtime,
    client: RowStoreClient,
}

impl BlockingRowStore {
    pub fn new(config: RowStoreConfig) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| StoreError::Fatal(format!("Runtime error: {}", e)))?;
        Ok(Self { runtime, client: RowStoreClient::new(config)? })
    }
}

impl HotspotStore for BlockingRowStore {
    fn list(&self) -> Result<Vec<Value>, StoreError> {
        self.runtime.block_on(self.client.list())
    }

    fn create(&self, draft: &HotspotDraft) -> Result<Value, StoreError> {
        self.runtime.block_on(self.client.create(draft))
    }

    fn update(&self, key: &str, draft: &HotspotDraft) -> Result<Value, StoreError> {
        self.runtime.block_on(self.client.update(key, draft))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.runtime.block_on(self.client.delete(key))
    }
}

fn status_error(status: StatusCode) -> StoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StoreError::Retryable(format!("HTTP {}", status))
    } else {
        StoreError::Fatal(format!("HTTP {}", status))
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() {
        StoreError::Retryable(format!("Request error: {}", e))
    } else {
        StoreError::Fatal(format!("Request error: {}", e))
    }
}

/// Numeric keys go over the wire as numbers.
fn key_value(key: &str) -> Value {
    key.parse::<u64>().map_or_else(|_| json!(key), |n| json!(n))
}

fn with_key(mut record: Value, key: &str) -> Value {
    if let Value::Object(fields) = &mut record {
        fields.insert(PRIMARY_KEY.into(), key_value(key));
    }
    record
}

/// The store answers writes with little more than the key; fold it into the
/// record that was sent.
fn merge_key(record: Value, response: &Value) -> Value {
    match response.get(PRIMARY_KEY) {
        Some(Value::Number(n)) => with_key(record, &n.to_string()),
        Some(Value::String(s)) => with_key(record, s),
        _ => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> RowStoreConfig {
        RowStoreConfig {
            base_url: base.into(),
            table_id: "m1abc".into(),
            token: "secret".into(),
        }
    }

    #[test]
    fn test_records_url() {
        assert_eq!(
            config("https://rows.example.com/").records_url(),
            "https://rows.example.com/api/v2/tables/m1abc/records"
        );
        assert_eq!(
            config("https://rows.example.com").records_url(),
            "https://rows.example.com/api/v2/tables/m1abc/records"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(status_error(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!status_error(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!status_error(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(key_value("12"), json!(12));
        assert_eq!(key_value("abc"), json!("abc"));
        assert_eq!(with_key(json!({ "NOME-WIFI": "x" }), "3")["Id"], json!(3));
    }

    #[test]
    fn test_merge_key_from_response() {
        let sent = json!({ "NOME-WIFI": "Lobby" });
        let merged = merge_key(sent.clone(), &json!({ "Id": 9 }));
        assert_eq!(merged["Id"], json!(9));
        assert_eq!(merged["NOME-WIFI"], json!("Lobby"));
        assert_eq!(merge_key(sent.clone(), &Value::Null), sent);
    }

    #[test]
    fn test_config_from_json() {
        let cfg: RowStoreConfig = serde_json::from_str(
            r#"{ "base_url": "https://rows.example.com", "table_id": "t", "token": "k" }"#,
        )
        .unwrap();
        assert_eq!(cfg.table_id, "t");
    }

    #[tokio::test]
    async fn test_invalid_draft_rejected_before_request() {
        let client = RowStoreClient::new(config("http://127.0.0.1:9")).unwrap();
        let err = client.create(&HotspotDraft::default()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
