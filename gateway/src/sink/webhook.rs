//! HTTP webhook sink
//!
//! POSTs each channel write as a JSON array to `<base>/<channel>`.
//!
//! # Example
//!
//! ```ignore
//! let sink = WebhookSink::new("https://store.example.com/collections")?
//!     .header("Authorization", "Bearer token123");
//! // records for `outputVemcon` go to https://store.example.com/collections/outputVemcon
//! ```

use crate::error::SinkError;
use crate::poll::{describe, truncate};
use crate::record::EnrichedRecord;
use crate::sink::Sink;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Posts each channel's records to a collection endpoint of a document store
pub struct WebhookSink {
    client: Client,
    base_url: String,
    health_url: Option<String>,
    headers: HashMap<String, String>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

impl WebhookSink {
    /// Create a new WebhookSink posting under the given base URL
    ///
    /// Uses default timeouts: 30s request timeout, 10s connection timeout
    ///
    /// # Errors
    /// Returns `SinkError::Init` if the HTTP client cannot be created
    pub fn new(base_url: impl Into<String>) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SinkError::Init(format!("webhook HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            health_url: None,
            headers: HashMap::new(),
        })
    }

    /// Set a custom health check URL
    ///
    /// By default, health checks use a HEAD request to the base URL.
    pub fn health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    /// Add a custom header to all requests
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// URL records for `channel` are posted to
    pub fn channel_url(&self, channel: &str) -> String {
        format!("{}/{}", self.base_url, channel)
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let url = self.channel_url(channel);
        let mut request = self.client.post(&url).json(records);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(channel, url = %url, error = %e, "Channel store unreachable");
            SinkError::Connection(format!("channel '{channel}' at {url}: {}", describe(&e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(channel, status = status.as_u16(), "Channel store rejected records");
            return Err(SinkError::Send(format!(
                "channel '{channel}' rejected with {status}: {}",
                truncate(&body)
            )));
        }

        debug!(channel, count = records.len(), "Channel records stored");
        Ok(())
    }

    /// Reachable unless the store answers 5xx or not at all
    async fn health(&self) -> bool {
        let url = self.health_url.as_deref().unwrap_or(&self.base_url);
        match self.client.head(url).send().await {
            Ok(response) if response.status().is_server_error() => {
                debug!(url, status = response.status().as_u16(), "Channel store unhealthy");
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!(url, error = %describe(&e), "Channel store unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::enrich;
    use crate::record::SourceMeta;
    use crate::registry::VendorEntry;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Shared state for mock server
    #[derive(Default)]
    struct MockServerState {
        received: Mutex<Vec<(String, Vec<Value>)>>,
        auth_headers: Mutex<Vec<String>>,
        request_count: AtomicUsize,
    }

    /// Start a mock HTTP server, returns its address
    async fn start_mock_server() -> (SocketAddr, Arc<MockServerState>) {
        let state = Arc::new(MockServerState::default());

        let app = Router::new()
            .route("/store/{channel}", post(handle_records))
            .route("/store", get(handle_health).head(handle_health))
            .route("/broken/{channel}", post(handle_broken))
            .route("/broken", get(handle_broken).head(handle_broken))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give server time to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        (addr, state)
    }

    async fn handle_records(
        State(state): State<Arc<MockServerState>>,
        Path(channel): Path<String>,
        headers: HeaderMap,
        Json(records): Json<Vec<Value>>,
    ) -> StatusCode {
        state.request_count.fetch_add(1, Ordering::Relaxed);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            state.auth_headers.lock().await.push(auth.to_string());
        }
        state.received.lock().await.push((channel, records));
        StatusCode::OK
    }

    async fn handle_broken() -> (StatusCode, &'static str) {
        (StatusCode::SERVICE_UNAVAILABLE, "store offline")
    }

    async fn handle_health() -> StatusCode {
        StatusCode::OK
    }

    fn make_record(id: &str) -> EnrichedRecord {
        let raw = json!({"deviceVendor": "vemcon", "battery": 91});
        enrich(
            raw.as_object().cloned().unwrap(),
            &VendorEntry::new("vemcon"),
            &SourceMeta::pushed(id, "2024-05-01T12:00:00.000Z"),
        )
    }

    #[tokio::test]
    async fn test_webhook_sink_creates() {
        let sink = WebhookSink::new("http://localhost:8080/store/").unwrap();
        assert_eq!(sink.name(), "webhook");
        assert_eq!(
            sink.channel_url("outputVemcon"),
            "http://localhost:8080/store/outputVemcon"
        );
    }

    #[tokio::test]
    async fn test_webhook_sink_posts_to_channel_url() {
        let (addr, state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/store", addr)).unwrap();

        let result = sink
            .write("outputVemcon", &[make_record("d1"), make_record("d2")])
            .await;
        assert!(result.is_ok(), "Should write records successfully");

        let received = state.received.lock().await;
        assert_eq!(received.len(), 1);
        let (channel, records) = &received[0];
        assert_eq!(channel, "outputVemcon");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["deviceId"], "d1");
        assert_eq!(records[1]["deviceId"], "d2");
        assert_eq!(records[0]["battery"], 91);
    }

    #[tokio::test]
    async fn test_webhook_sink_empty_write_is_noop() {
        let (addr, state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/store", addr)).unwrap();

        let result = sink.write("outputVemcon", &[]).await;
        assert!(result.is_ok(), "Should accept an empty write");
        assert_eq!(state.request_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_webhook_sink_sends_custom_headers() {
        let (addr, state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/store", addr))
            .unwrap()
            .header("Authorization", "Bearer test-token");

        sink.write("outputVemcon", &[make_record("d1")]).await.unwrap();

        let auth = state.auth_headers.lock().await;
        assert_eq!(*auth, vec!["Bearer test-token".to_string()]);
    }

    #[tokio::test]
    async fn test_webhook_sink_reports_error_status() {
        let (addr, _state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/broken", addr)).unwrap();

        let err = sink
            .write("outputVemcon", &[make_record("d1")])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Send(_)));
        let message = err.to_string();
        assert!(message.contains("channel 'outputVemcon' rejected with 503"));
        assert!(message.contains("store offline"));
    }

    #[tokio::test]
    async fn test_webhook_sink_unhealthy_on_server_error() {
        let (addr, _state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/broken", addr)).unwrap();
        assert!(!sink.health().await);

        let sink = WebhookSink::new(format!("http://{}/broken", addr))
            .unwrap()
            .health_url(format!("http://{}/store", addr));
        assert!(sink.health().await);
    }

    #[tokio::test]
    async fn test_webhook_sink_health_check() {
        let (addr, _state) = start_mock_server().await;
        let sink = WebhookSink::new(format!("http://{}/store", addr)).unwrap();
        assert!(sink.health().await, "Health check should pass");
    }

    #[tokio::test]
    async fn test_webhook_sink_failure_on_bad_url() {
        let sink = WebhookSink::new("http://127.0.0.1:1/store").unwrap();

        let err = sink
            .write("outputVemcon", &[make_record("d1")])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Connection(_)));
        assert!(
            err.to_string()
                .contains("channel 'outputVemcon' at http://127.0.0.1:1/store/outputVemcon")
        );
        assert!(!sink.health().await);
    }
}
