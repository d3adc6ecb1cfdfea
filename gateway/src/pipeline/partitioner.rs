//! Batch partitioner
//!
//! Splits one push-path batch into per-vendor groups in a single ordered
//! pass: classify, enrich with the positional trigger metadata, append.
//!
//! ```text
//! records:  [A1, B1, ?, A2]          metadata: [m0, m1, m2, m3]
//!             │   │   │   │
//!             ▼   ▼   ✗   ▼
//! groups:   A → [A1+m0, A2+m3]
//!           B → [B1+m1]
//!           C → []                   (declared, still bound)
//! ```

use crate::pipeline::classifier::{ClassificationMiss, VendorClassifier};
use crate::pipeline::enricher::enrich;
use crate::record::{EnrichedRecord, TriggerBatch};
use crate::registry::VendorRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records of one vendor, in batch order
#[derive(Debug, Clone, PartialEq)]
pub struct VendorGroup {
    pub vendor: String,
    pub channel: String,
    pub records: Vec<EnrichedRecord>,
}

impl VendorGroup {
    pub fn new(vendor: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            channel: channel.into(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records excluded from a batch, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropStats {
    pub missing_vendor: usize,
    pub unknown_vendor: usize,
    pub missing_metadata: usize,
    pub not_an_object: usize,
}

impl DropStats {
    pub fn total(&self) -> usize {
        self.missing_vendor + self.unknown_vendor + self.missing_metadata + self.not_an_object
    }

    /// Non-zero counts with their metric labels
    pub fn by_reason(&self) -> impl Iterator<Item = (&'static str, usize)> {
        [
            ("missing_vendor", self.missing_vendor),
            ("unknown_vendor", self.unknown_vendor),
            ("missing_metadata", self.missing_metadata),
            ("not_an_object", self.not_an_object),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
    }

    fn record_miss(&mut self, miss: &ClassificationMiss) {
        match miss {
            ClassificationMiss::MissingVendor => self.missing_vendor += 1,
            ClassificationMiss::UnknownVendor(_) => self.unknown_vendor += 1,
        }
    }
}

/// Result of partitioning one batch
///
/// Holds one group per registry vendor, in registry declaration order,
/// including vendors with no records in this batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    groups: Vec<VendorGroup>,
    received: usize,
    dropped: DropStats,
}

impl Partition {
    pub fn groups(&self) -> &[VendorGroup] {
        &self.groups
    }

    /// Group for a vendor tag
    pub fn group(&self, vendor: &str) -> Option<&VendorGroup> {
        self.groups.iter().find(|g| g.vendor == vendor)
    }

    /// Records in the incoming batch
    pub fn received(&self) -> usize {
        self.received
    }

    /// Records that made it into a group
    pub fn classified(&self) -> usize {
        self.groups.iter().map(VendorGroup::len).sum()
    }

    pub fn dropped(&self) -> DropStats {
        self.dropped
    }
}

/// Partitions push-path batches by vendor
#[derive(Debug, Clone)]
pub struct BatchPartitioner {
    registry: Arc<VendorRegistry>,
}

impl BatchPartitioner {
    pub fn new(registry: Arc<VendorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    /// Partition a batch
    ///
    /// Returns `None` for an empty batch or one whose records are not a
    /// sequence: nothing is classified, enriched or bound.
    pub fn partition(&self, batch: TriggerBatch) -> Option<Partition> {
        let TriggerBatch { records, metadata } = batch;
        let records = match records {
            Value::Array(items) if !items.is_empty() => items,
            _ => return None,
        };

        let classifier = VendorClassifier::new(&self.registry);
        let mut groups: Vec<VendorGroup> = self
            .registry
            .iter()
            .map(|entry| VendorGroup::new(entry.tag(), entry.channel_name()))
            .collect();
        let mut dropped = DropStats::default();
        let received = records.len();

        for (idx, item) in records.into_iter().enumerate() {
            let Value::Object(record) = item else {
                debug!(index = idx, "Dropped record: not an object");
                dropped.not_an_object += 1;
                continue;
            };

            let vendor = match classifier.resolve(&record) {
                Ok(vendor) => vendor,
                Err(miss) => {
                    debug!(index = idx, reason = miss.reason(), "Dropped record: unclassified");
                    dropped.record_miss(&miss);
                    continue;
                }
            };

            let Some(meta) = metadata.get(idx).and_then(|m| m.source_meta()) else {
                warn!(
                    index = idx,
                    vendor = vendor.tag(),
                    "Dropped record: trigger metadata missing device identity or enqueue time"
                );
                dropped.missing_metadata += 1;
                continue;
            };

            let Some(position) = self.registry.position(vendor.tag()) else {
                continue;
            };
            groups[position].records.push(enrich(record, vendor, &meta));
        }

        debug!(
            received,
            dropped = dropped.total(),
            groups = groups.len(),
            "Partitioned batch"
        );

        Some(Partition {
            groups,
            received,
            dropped,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::TriggerMetadata;
    use serde_json::json;

    fn partitioner(declaration: &str) -> BatchPartitioner {
        BatchPartitioner::new(Arc::new(VendorRegistry::parse(declaration).unwrap()))
    }

    fn meta(id: &str, t: &str) -> TriggerMetadata {
        TriggerMetadata::new(id, t)
    }

    fn values(group: &VendorGroup) -> Vec<Value> {
        group.records.iter().cloned().map(Value::from).collect()
    }

    #[test]
    fn test_two_vendor_scenario() {
        let batch = TriggerBatch::new(
            vec![
                json!({"deviceVendor": "A", "x": 1}),
                json!({"deviceVendor": "B", "x": 2}),
                json!({"x": 3}),
            ],
            vec![meta("d1", "T1"), meta("d2", "T2"), meta("d3", "T3")],
        );

        let partition = partitioner("A=outA,B=outB").partition(batch).unwrap();

        let a = partition.group("A").unwrap();
        assert_eq!(a.channel, "outA");
        assert_eq!(
            values(a),
            vec![json!({"deviceVendor": "A", "x": 1, "deviceId": "d1", "enqueuedTimeUtc": "T1"})]
        );

        let b = partition.group("B").unwrap();
        assert_eq!(b.channel, "outB");
        assert_eq!(
            values(b),
            vec![json!({"deviceVendor": "B", "x": 2, "deviceId": "d2", "enqueuedTimeUtc": "T2"})]
        );

        assert_eq!(partition.received(), 3);
        assert_eq!(partition.classified(), 2);
        assert_eq!(partition.dropped().missing_vendor, 1);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let p = partitioner("A");
        assert!(p.partition(TriggerBatch::new(vec![], vec![])).is_none());
        assert!(p.partition(TriggerBatch::default()).is_none());

        let not_a_sequence = TriggerBatch {
            records: json!({"deviceVendor": "A"}),
            metadata: vec![meta("d1", "T1")],
        };
        assert!(p.partition(not_a_sequence).is_none());
    }

    #[test]
    fn test_declared_vendors_always_get_a_group() {
        let batch = TriggerBatch::new(
            vec![json!({"deviceVendor": "A"})],
            vec![meta("d1", "T1")],
        );
        let partition = partitioner("A,B,C").partition(batch).unwrap();

        let tags: Vec<&str> = partition.groups().iter().map(|g| g.vendor.as_str()).collect();
        assert_eq!(tags, vec!["A", "B", "C"]);
        assert!(partition.group("B").unwrap().is_empty());
        assert!(partition.group("C").unwrap().is_empty());
    }

    #[test]
    fn test_batch_with_only_unclassified_records_still_binds() {
        let batch = TriggerBatch::new(vec![json!({"x": 1})], vec![meta("d1", "T1")]);
        let partition = partitioner("A").partition(batch).unwrap();

        assert_eq!(partition.groups().len(), 1);
        assert_eq!(partition.classified(), 0);
    }

    #[test]
    fn test_order_preserved_within_group() {
        let records: Vec<Value> = (0..10)
            .map(|i| {
                let vendor = if i % 3 == 0 { "B" } else { "A" };
                json!({"deviceVendor": vendor, "seq": i})
            })
            .collect();
        let metadata = (0..10).map(|i| meta(&format!("d{i}"), "T")).collect();

        let partition = partitioner("A,B")
            .partition(TriggerBatch::new(records, metadata))
            .unwrap();

        let seqs = |tag: &str| -> Vec<i64> {
            partition
                .group(tag)
                .unwrap()
                .records
                .iter()
                .map(|r| r.get("seq").and_then(Value::as_i64).unwrap())
                .collect()
        };
        assert_eq!(seqs("A"), vec![1, 2, 4, 5, 7, 8]);
        assert_eq!(seqs("B"), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_metadata_is_positional() {
        let batch = TriggerBatch::new(
            vec![
                json!({"x": 0}),
                json!({"deviceVendor": "A"}),
                json!({"deviceVendor": "A"}),
            ],
            vec![meta("d0", "T0"), meta("d1", "T1"), meta("d2", "T2")],
        );
        let partition = partitioner("A").partition(batch).unwrap();
        let group = partition.group("A").unwrap();

        assert_eq!(group.records[0].device_id(), "d1");
        assert_eq!(group.records[0].enqueued_time_utc(), "T1");
        assert_eq!(group.records[1].device_id(), "d2");
    }

    #[test]
    fn test_records_without_metadata_are_dropped() {
        let batch = TriggerBatch::new(
            vec![
                json!({"deviceVendor": "A", "n": 1}),
                json!({"deviceVendor": "A", "n": 2}),
                json!({"deviceVendor": "A", "n": 3}),
            ],
            vec![meta("d1", "T1"), meta("", "T2")],
        );
        let partition = partitioner("A").partition(batch).unwrap();

        assert_eq!(partition.group("A").unwrap().len(), 1);
        assert_eq!(partition.dropped().missing_metadata, 2);
        for record in &partition.group("A").unwrap().records {
            assert!(!record.device_id().is_empty());
            assert!(!record.enqueued_time_utc().is_empty());
        }
    }

    #[test]
    fn test_unparseable_metadata_entry_drops_its_record() {
        let batch: TriggerBatch = serde_json::from_value(json!({
            "records": [{"deviceVendor": "A", "n": 1}, {"deviceVendor": "A", "n": 2}],
            "metadata": [{"connectionDeviceId": "d1", "enqueuedTimeUtc": "T1"}, null]
        }))
        .unwrap();
        let partition = partitioner("A").partition(batch).unwrap();

        let group = partition.group("A").unwrap();
        assert_eq!(
            values(group),
            vec![json!({"deviceVendor": "A", "n": 1, "deviceId": "d1", "enqueuedTimeUtc": "T1"})]
        );
        assert_eq!(partition.dropped().missing_metadata, 1);
    }

    #[test]
    fn test_unknown_and_non_object_records_dropped() {
        let batch = TriggerBatch::new(
            vec![
                json!({"deviceVendor": "acme"}),
                json!(42),
                json!("text"),
                json!({"deviceVendor": "A"}),
            ],
            vec![meta("d0", "T"), meta("d1", "T"), meta("d2", "T"), meta("d3", "T")],
        );
        let partition = partitioner("A").partition(batch).unwrap();

        assert_eq!(partition.classified(), 1);
        assert_eq!(
            partition.dropped(),
            DropStats {
                unknown_vendor: 1,
                not_an_object: 2,
                ..Default::default()
            }
        );
        let reasons: Vec<_> = partition.dropped().by_reason().collect();
        assert_eq!(reasons, vec![("unknown_vendor", 1), ("not_an_object", 2)]);
    }
}
