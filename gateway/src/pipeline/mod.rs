//! Normalization pipeline
//!
//! The pure part of the gateway: no I/O, no async.
//!
//! ```text
//! TriggerBatch ──► BatchPartitioner ──┬─► VendorClassifier (tag → registry entry)
//!                                     └─► enrich (deviceId, deviceVendor, enqueuedTimeUtc)
//!                                               │
//!                                               ▼
//!                                     Partition: one VendorGroup per registry vendor
//! ```
//!
//! Polling adapters reuse [`enrich`] for their reshape stage.

pub mod classifier;
pub mod enricher;
pub mod partitioner;

pub use classifier::{ClassificationMiss, VendorClassifier};
pub use enricher::enrich;
pub use partitioner::{BatchPartitioner, DropStats, Partition, VendorGroup};
