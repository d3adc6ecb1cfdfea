//! Record types that flow through the gateway
//!
//! A [`RawRecord`] is whatever a vendor sent: an open JSON object with no
//! schema beyond an optional `deviceVendor` field. An [`EnrichedRecord`] is
//! the same object after the enricher stamped the three fields every sink
//! relies on.
//!
//! ```text
//! RawRecord ──► classify ──► enrich(vendor, SourceMeta) ──► EnrichedRecord
//!                                                           ├─ deviceId
//!                                                           ├─ deviceVendor
//!                                                           └─ enqueuedTimeUtc
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Field carrying the vendor tag
pub const DEVICE_VENDOR: &str = "deviceVendor";
/// Field carrying the stable device identifier
pub const DEVICE_ID: &str = "deviceId";
/// Field carrying the ingestion timestamp
pub const ENQUEUED_TIME_UTC: &str = "enqueuedTimeUtc";

/// A vendor payload as received, key order preserved
pub type RawRecord = Map<String, Value>;

/// Where a record's device identity comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIdentity {
    /// Identity asserted by the transport layer (push path), used verbatim
    Connection(String),
    /// Vendor-native asset id found in the payload (pull path), prefixed
    /// with the vendor tag by the enricher
    Native(String),
}

/// Per-record source metadata handed to the enricher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    pub identity: DeviceIdentity,
    pub enqueued_time: String,
}

impl SourceMeta {
    /// Metadata for a record delivered by the event-stream trigger
    pub fn pushed(connection_device_id: impl Into<String>, enqueued_time: impl Into<String>) -> Self {
        Self {
            identity: DeviceIdentity::Connection(connection_device_id.into()),
            enqueued_time: enqueued_time.into(),
        }
    }

    /// Metadata for a record fetched by a polling adapter
    pub fn polled(native_asset_id: impl Into<String>, fetched_at: impl Into<String>) -> Self {
        Self {
            identity: DeviceIdentity::Native(native_asset_id.into()),
            enqueued_time: fetched_at.into(),
        }
    }
}

/// A record with `deviceId`, `deviceVendor` and `enqueuedTimeUtc` populated
///
/// Only the enricher constructs these, so every value of this type satisfies
/// the output invariant. Serializes as the plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnrichedRecord(Map<String, Value>);

impl EnrichedRecord {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn device_id(&self) -> &str {
        self.str_field(DEVICE_ID)
    }

    pub fn device_vendor(&self) -> &str {
        self.str_field(DEVICE_VENDOR)
    }

    pub fn enqueued_time_utc(&self) -> &str {
        self.str_field(ENQUEUED_TIME_UTC)
    }

    /// Look up any field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set an additional field
    ///
    /// The three enrichment fields are owned by the enricher; attempts to
    /// overwrite them are ignored and return `false`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if matches!(key.as_str(), DEVICE_ID | DEVICE_VENDOR | ENQUEUED_TIME_UTC) {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn str_field(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

impl From<EnrichedRecord> for Value {
    fn from(record: EnrichedRecord) -> Self {
        Value::Object(record.0)
    }
}

/// Per-record metadata supplied by the push trigger, parallel to the records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerMetadata {
    /// Device identity asserted by the connection (e.g. an IoT hub device id)
    #[serde(alias = "iothub-connection-device-id")]
    pub connection_device_id: String,
    /// Time the event stream accepted the record
    pub enqueued_time_utc: String,
}

impl TriggerMetadata {
    pub fn new(connection_device_id: impl Into<String>, enqueued_time_utc: impl Into<String>) -> Self {
        Self {
            connection_device_id: connection_device_id.into(),
            enqueued_time_utc: enqueued_time_utc.into(),
        }
    }

    /// Source metadata for the enricher, if both fields are present
    pub fn source_meta(&self) -> Option<SourceMeta> {
        if self.connection_device_id.is_empty() || self.enqueued_time_utc.is_empty() {
            return None;
        }
        Some(SourceMeta::pushed(
            self.connection_device_id.clone(),
            self.enqueued_time_utc.clone(),
        ))
    }
}

/// Decode one JSON pointer reference token (`~1` is `/`, `~0` is `~`)
pub(crate) fn pointer_token(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

/// A push-path batch as delivered by the trigger
///
/// `records` is kept as a raw JSON value: anything that is not an array is
/// treated as an empty batch. Metadata entries that fail to parse keep their
/// position as empty entries, so only the matching record is dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerBatch {
    pub records: Value,
    #[serde(deserialize_with = "lenient_metadata")]
    pub metadata: Vec<TriggerMetadata>,
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<Vec<TriggerMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries
            .into_iter()
            .map(|entry| TriggerMetadata::deserialize(entry).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

impl TriggerBatch {
    pub fn new(records: Vec<Value>, metadata: Vec<TriggerMetadata>) -> Self {
        Self {
            records: Value::Array(records),
            metadata,
        }
    }

    /// Records of the batch, `None` when the batch is empty or not a sequence
    pub fn records(&self) -> Option<&[Value]> {
        match &self.records {
            Value::Array(items) if !items.is_empty() => Some(items.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enriched() -> EnrichedRecord {
        let Value::Object(map) = json!({
            "deviceVendor": "vemcon",
            "deviceId": "vemcon_42",
            "enqueuedTimeUtc": "2024-05-01T12:00:00.000Z",
            "battery": 88
        }) else {
            unreachable!()
        };
        EnrichedRecord::from_map(map)
    }

    #[test]
    fn test_enriched_accessors() {
        let record = enriched();
        assert_eq!(record.device_id(), "vemcon_42");
        assert_eq!(record.device_vendor(), "vemcon");
        assert_eq!(record.enqueued_time_utc(), "2024-05-01T12:00:00.000Z");
        assert_eq!(record.get("battery"), Some(&json!(88)));
    }

    #[test]
    fn test_insert_refuses_enrichment_fields() {
        let mut record = enriched();
        assert!(!record.insert(DEVICE_ID, json!("spoofed")));
        assert_eq!(record.device_id(), "vemcon_42");

        assert!(record.insert("id", json!("vemcon_42")));
        assert_eq!(record.get("id"), Some(&json!("vemcon_42")));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let value = serde_json::to_value(enriched()).unwrap();
        assert_eq!(value["deviceId"], "vemcon_42");
        assert_eq!(value["battery"], 88);
    }

    #[test]
    fn test_trigger_metadata_requires_both_fields() {
        assert!(TriggerMetadata::new("dev-1", "T1").source_meta().is_some());
        assert!(TriggerMetadata::new("", "T1").source_meta().is_none());
        assert!(TriggerMetadata::new("dev-1", "").source_meta().is_none());
    }

    #[test]
    fn test_pointer_token_unescapes() {
        assert_eq!(pointer_token("plain"), "plain");
        assert_eq!(pointer_token("a~1b"), "a/b");
        assert_eq!(pointer_token("a~0b"), "a~b");
        assert_eq!(pointer_token("~01"), "~1");
    }

    #[test]
    fn test_trigger_batch_deserialize() {
        let batch: TriggerBatch = serde_json::from_value(json!({
            "records": [{"deviceVendor": "vemcon"}],
            "metadata": [{"connectionDeviceId": "dev-1", "enqueuedTimeUtc": "T1"}]
        }))
        .unwrap();

        assert_eq!(batch.records().map(<[Value]>::len), Some(1));
        assert_eq!(batch.metadata[0], TriggerMetadata::new("dev-1", "T1"));
    }

    #[test]
    fn test_trigger_batch_tolerates_bad_metadata_entries() {
        let batch: TriggerBatch = serde_json::from_value(json!({
            "records": [{}, {}, {}],
            "metadata": [
                {"connectionDeviceId": "dev-1", "enqueuedTimeUtc": "T1"},
                null,
                {"connectionDeviceId": 42, "enqueuedTimeUtc": "T3"}
            ]
        }))
        .unwrap();

        assert_eq!(batch.metadata.len(), 3);
        assert!(batch.metadata[0].source_meta().is_some());
        assert_eq!(batch.metadata[1], TriggerMetadata::default());
        assert!(batch.metadata[2].source_meta().is_none());

        let batch: TriggerBatch =
            serde_json::from_value(json!({"records": [{}], "metadata": "oops"})).unwrap();
        assert!(batch.metadata.is_empty());
    }

    #[test]
    fn test_trigger_batch_not_a_sequence() {
        let batch: TriggerBatch =
            serde_json::from_value(json!({"records": {"deviceVendor": "vemcon"}})).unwrap();
        assert!(batch.records().is_none());

        let batch = TriggerBatch::new(vec![], vec![]);
        assert!(batch.records().is_none());
    }
}
