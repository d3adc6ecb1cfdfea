//! Polling adapters for pull-based vendors
//!
//! Each cycle is strictly sequential:
//!
//! ```text
//! Authenticate ──► Fetch ──► Reshape ──► Emit
//!      │             │          │
//!      └─────────────┴──────────┴──► abort: no output, error logged
//! ```
//!
//! Adapters only talk HTTP. Reshaping into enriched records is shared and
//! driven by the vendor's registry profile.

pub mod mts_smart;
pub mod sanitize;
pub mod vemcon;

pub use mts_smart::MtsSmartAdapter;
pub use vemcon::VemconAdapter;

use crate::error::{GatewayError, PollError};
use crate::pipeline::enrich;
use crate::record::{EnrichedRecord, SourceMeta};
use crate::registry::VendorEntry;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default upstream request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session token obtained by the authenticate stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookie: String,
}

impl Session {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
        }
    }

    /// `name=value` pair to send back in a `Cookie` header
    pub fn cookie(&self) -> &str {
        &self.cookie
    }
}

/// A vendor pull client
///
/// Implementations perform the network stages only. `poll` drives them and
/// does the reshaping.
#[async_trait]
pub trait PollingAdapter: Send + Sync {
    /// Registry tag of the vendor this adapter polls
    fn vendor(&self) -> &str;

    /// Obtain a session, if the vendor requires one
    async fn authenticate(&self) -> Result<Option<Session>, PollError> {
        Ok(None)
    }

    /// Fetch the raw current-state document
    async fn fetch(&self, session: Option<&Session>) -> Result<Bytes, PollError>;

    /// JSON pointer to the item array in the fetched document (`""` = root)
    fn collection_pointer(&self) -> &str {
        ""
    }
}

/// Run one cycle and return the reshaped batch
///
/// Any stage failure aborts the whole cycle. Nothing partial is returned.
pub async fn poll(
    adapter: &dyn PollingAdapter,
    vendor: &VendorEntry,
) -> Result<Vec<EnrichedRecord>, PollError> {
    let session = adapter.authenticate().await?;
    let body = adapter.fetch(session.as_ref()).await?;
    let fetched_at = fetch_timestamp();
    debug!(vendor = vendor.tag(), bytes = body.len(), "Fetched current state");
    reshape(vendor, &body, adapter.collection_pointer(), &fetched_at)
}

/// UTC RFC 3339 timestamp with millisecond precision
pub fn fetch_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Turn a fetched document into enriched records
///
/// Every item of the collection must be an object carrying the vendor's
/// native asset id; a single bad item fails the batch.
pub fn reshape(
    vendor: &VendorEntry,
    body: &[u8],
    collection: &str,
    fetched_at: &str,
) -> Result<Vec<EnrichedRecord>, PollError> {
    let tag = vendor.tag();
    let text = std::str::from_utf8(body)
        .map_err(|e| PollError::reshape(tag, format!("response is not UTF-8: {e}")))?;
    let document: Value = serde_json::from_str(&sanitize::nan_to_null(text))
        .map_err(|e| PollError::reshape(tag, format!("malformed JSON: {e}")))?;

    let items = match document.pointer(collection) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(PollError::reshape(
                tag,
                format!("collection at '{collection}' is not an array"),
            ));
        }
        None => {
            return Err(PollError::reshape(
                tag,
                format!("collection '{collection}' missing from response"),
            ));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(raw) = item else {
            return Err(PollError::reshape(
                tag,
                format!("item {index} is not an object"),
            ));
        };
        let asset_id = vendor.native_asset_id(raw).ok_or_else(|| {
            PollError::reshape(tag, format!("item {index} has no native asset id"))
        })?;
        let meta = SourceMeta::polled(asset_id, fetched_at);
        records.push(enrich(raw.clone(), vendor, &meta));
    }
    Ok(records)
}

/// HTTP client shared by one adapter
pub(crate) fn http_client(timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a request and require a 2xx status
///
/// `fail` builds the stage-specific error.
pub(crate) async fn send(
    request: RequestBuilder,
    fail: impl Fn(String) -> PollError,
) -> Result<reqwest::Response, PollError> {
    let response = request.send().await.map_err(|e| fail(describe(&e)))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(fail(format!("upstream returned {status}: {}", truncate(&body))))
}

pub(crate) fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

pub(crate) fn truncate(body: &str) -> &str {
    const MAX: usize = 256;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => &body[..cut],
        None => body,
    }
}
