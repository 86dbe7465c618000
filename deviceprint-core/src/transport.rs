//! HTTP transport for the device API
//!
//! [`DeviceApiClient`] posts collected records to the backend save
//! endpoint and exposes the small read/admin surface around it. Delivery
//! is decoupled from the gate through [`RecordSink`], and
//! [`FallbackSink`] wraps a client with the degrading local-store chain:
//! when the backend is unreachable the record is preserved locally in
//! progressively reduced form, and the original transport error still
//! reaches the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::TransportConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{DeviceRecord, SaveResponse, StoredDevice};

/// Destination for gated records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one record, returning the backend acknowledgement.
    async fn deliver(&self, record: &DeviceRecord) -> Result<SaveResponse>;
}

/// Response from `GET /api/devices/count`.
#[derive(Debug, serde::Deserialize)]
struct CountResponse {
    count: i64,
}

/// Response from `DELETE /api/devices/{id}`.
#[derive(Debug, serde::Deserialize)]
struct DeleteResponse {
    success: bool,
}

/// HTTP client for the device API
pub struct DeviceApiClient {
    config: TransportConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl DeviceApiClient {
    /// Create a new device API client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("transport.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Post one record to the save endpoint.
    pub async fn save_device(&self, record: &DeviceRecord) -> Result<SaveResponse> {
        let url = format!("{}/api/devices/save", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: SaveResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(result)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Save a record with retry on transient failures.
    ///
    /// Retries 5xx responses and network errors with exponential backoff.
    pub async fn save_device_with_retry(&self, record: &DeviceRecord) -> Result<SaveResponse> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying save_device (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.save_device(record).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient error saving device: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Transport("max retries exceeded".to_string())))
    }

    /// All stored devices, as returned by the backend.
    pub async fn list_devices(&self) -> Result<Vec<StoredDevice>> {
        let url = format!("{}/api/devices", self.base_url);
        self.get_json(&url).await
    }

    /// Number of stored devices.
    pub async fn count_devices(&self) -> Result<i64> {
        let url = format!("{}/api/devices/count", self.base_url);
        let response: CountResponse = self.get_json(&url).await?;
        Ok(response.count)
    }

    /// Devices whose stored name matches `name`, case-insensitively.
    pub async fn search_devices(&self, name: &str) -> Result<Vec<StoredDevice>> {
        let url = format!(
            "{}/api/devices/search/{}",
            self.base_url,
            urlencoding::encode(name)
        );
        self.get_json(&url).await
    }

    /// Delete one stored device by id.
    ///
    /// Returns false if the id did not exist.
    pub async fn delete_device(&self, id: &str) -> Result<bool> {
        let url = format!(
            "{}/api/devices/{}",
            self.base_url,
            urlencoding::encode(id)
        );

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: DeleteResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(result.success)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Check if the client can reach the backend
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Wrap this client with the local-store fallback chain.
    pub fn with_fallback(self, db: Arc<Database>) -> FallbackSink {
        FallbackSink { client: self, db }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

#[async_trait]
impl RecordSink for DeviceApiClient {
    async fn deliver(&self, record: &DeviceRecord) -> Result<SaveResponse> {
        self.save_device_with_retry(record).await
    }
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Transport(msg) => {
            // Retry on 5xx errors
            msg.contains("50") && (msg.contains("API error") || msg.contains("HTTP"))
                // Retry on network/timeout errors
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}

/// A client wrapped with the degrading local-store fallback.
///
/// On delivery failure the record is preserved locally in progressively
/// reduced form: first with bulky captured content stripped, then the
/// identity subset only, then a bare presence marker. The first local
/// write that succeeds ends the chain; the original transport error is
/// returned to the caller either way.
pub struct FallbackSink {
    client: DeviceApiClient,
    db: Arc<Database>,
}

/// Bulky capture fields stripped at the first fallback level.
const BULKY_FIELDS: [&str; 4] = [
    "localStorageData",
    "sessionStorageData",
    "clipboardContent",
    "pushNotificationToken",
];

/// Identity subset kept at the second fallback level.
const IDENTITY_FIELDS: [&str; 8] = [
    "timestamp",
    "deviceName",
    "osName",
    "osVersion",
    "browserName",
    "browserVersion",
    "platform",
    "userAgent",
];

fn trimmed_payload(value: &serde_json::Value) -> serde_json::Value {
    let mut value = value.clone();
    if let Some(map) = value.as_object_mut() {
        for field in BULKY_FIELDS {
            map.remove(field);
        }
    }
    value
}

fn minimal_payload(value: &serde_json::Value) -> serde_json::Value {
    let mut minimal = serde_json::Map::new();
    if let Some(map) = value.as_object() {
        for field in IDENTITY_FIELDS {
            if let Some(v) = map.get(field) {
                minimal.insert(field.to_string(), v.clone());
            }
        }
    }
    serde_json::Value::Object(minimal)
}

impl FallbackSink {
    /// Write the best local representation of a failed record.
    fn preserve_locally(&self, record: &DeviceRecord) {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(%err, "failed to serialize record for local fallback");
                return;
            }
        };
        let device_name = record.device_name.as_deref();

        let attempts = [
            trimmed_payload(&payload),
            minimal_payload(&payload),
            serde_json::json!({ "saved": false, "timestamp": payload["timestamp"] }),
        ];

        for (level, attempt) in attempts.iter().enumerate() {
            match self.db.add_device(device_name, attempt) {
                Ok(id) => {
                    tracing::info!(id, level, "record preserved in local fallback store");
                    return;
                }
                Err(err) => {
                    tracing::debug!(level, %err, "local fallback write failed");
                }
            }
        }
        tracing::warn!("all local fallback levels failed, record lost");
    }
}

#[async_trait]
impl RecordSink for FallbackSink {
    async fn deliver(&self, record: &DeviceRecord) -> Result<SaveResponse> {
        match self.client.deliver(record).await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!(%err, "delivery failed, preserving record locally");
                self.preserve_locally(record);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn unroutable_config() -> TransportConfig {
        TransportConfig {
            enabled: true,
            // Discard port; connections are refused immediately
            server_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 1,
            max_retries: 0,
        }
    }

    fn test_record() -> DeviceRecord {
        let mut record = DeviceRecord::empty(Utc::now());
        record.device_name = Some("Pixel 7".to_string());
        record.os_name = Some("Android".to_string());
        record.clipboard_content = Some("secret".to_string());
        record
    }

    #[test]
    fn test_client_requires_valid_config() {
        let config = TransportConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(DeviceApiClient::new(config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        let config = TransportConfig {
            enabled: true,
            server_url: Some("https://devices.example.com/".to_string()),
            ..Default::default()
        };
        let client = DeviceApiClient::new(config).unwrap();
        assert_eq!(client.base_url, "https://devices.example.com");
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Transport(
            "API error (500): internal error".to_string()
        )));
        assert!(is_retryable_error(&Error::Transport(
            "HTTP request failed: timeout".to_string()
        )));
        assert!(!is_retryable_error(&Error::Transport(
            "API error (400): bad request".to_string()
        )));
        assert!(!is_retryable_error(&Error::Transport(
            "API error (401): unauthorized".to_string()
        )));
    }

    #[test]
    fn test_trimmed_payload_strips_bulky_fields_only() {
        let payload = serde_json::to_value(test_record()).unwrap();
        let trimmed = trimmed_payload(&payload);

        assert!(trimmed.get("clipboardContent").is_none());
        assert!(trimmed.get("localStorageData").is_none());
        assert_eq!(trimmed["deviceName"], "Pixel 7");
        assert_eq!(trimmed["osName"], "Android");
        // The source payload is untouched
        assert_eq!(payload["clipboardContent"], "secret");
    }

    #[test]
    fn test_minimal_payload_keeps_identity_subset() {
        let payload = serde_json::to_value(test_record()).unwrap();
        let minimal = minimal_payload(&payload);

        let map = minimal.as_object().unwrap();
        assert_eq!(map["deviceName"], "Pixel 7");
        assert!(map.contains_key("timestamp"));
        assert!(!map.contains_key("screen"));
        assert!(!map.contains_key("battery"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_falls_back_to_local_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();

        let sink = DeviceApiClient::new(unroutable_config())
            .unwrap()
            .with_fallback(db.clone());

        let record = test_record();
        let err = sink.deliver(&record).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        // The trimmed form landed in the local store
        let stored = db.list_devices().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].device_name.as_deref(), Some("Pixel 7"));
        assert_eq!(stored[0].payload["osName"], "Android");
        assert!(stored[0].payload.get("clipboardContent").is_none());
    }

    #[tokio::test]
    async fn test_health_check_swallows_connection_errors() {
        let client = DeviceApiClient::new(unroutable_config()).unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
