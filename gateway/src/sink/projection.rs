//! Latest-state projection
//!
//! Wraps a sink so every record it receives carries `id = deviceId`. Behind
//! an upserting store keyed by `id`, this keeps exactly one current document
//! per device.
//!
//! ```text
//! Router ──► ProjectionSink ──(id = deviceId)──► inner sink (upsert by id)
//! ```

use crate::error::SinkError;
use crate::record::EnrichedRecord;
use crate::sink::Sink;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Field the projection writes the device id into
pub const DOCUMENT_ID: &str = "id";

/// Sink wrapper that stamps a document id on each record
pub struct ProjectionSink {
    inner: Arc<dyn Sink>,
}

impl ProjectionSink {
    pub fn wrap(inner: Arc<dyn Sink>) -> Self {
        Self { inner }
    }
}

/// Copy `deviceId` into the document id field of every record
pub fn project_latest(records: &[EnrichedRecord]) -> Vec<EnrichedRecord> {
    records
        .iter()
        .cloned()
        .map(|mut record| {
            let id = record.device_id().to_string();
            record.insert(DOCUMENT_ID, Value::from(id));
            record
        })
        .collect()
}

#[async_trait]
impl Sink for ProjectionSink {
    fn name(&self) -> &'static str {
        "projection"
    }

    async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        self.inner.write(channel, &project_latest(records)).await
    }

    async fn health(&self) -> bool {
        self.inner.health().await
    }

    async fn shutdown(&self) -> Result<(), SinkError> {
        self.inner.shutdown().await
    }
}
