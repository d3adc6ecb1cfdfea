//! Telemetry gateway - vendor telemetry normalization and fan-out
//!
//! Device telemetry from several vendors arrives either pushed (an ingestion
//! trigger delivers mixed-vendor batches) or pulled (adapters poll vendor
//! REST APIs on a cadence). Every record is stamped with a common identity
//! (`deviceId`, `deviceVendor`, `enqueuedTimeUtc`) and fanned out to one
//! output channel per vendor.
//!
//! # Architecture
//!
//! ```text
//! push: POST /ingest ──► BatchPartitioner ──┐
//!                                           ├──► OutputRouter ──► Sinks (one channel per vendor)
//! pull: PollingAdapter (tick) ──────────────┘
//! ```
//!
//! Vendors are data: adding one is one [`VendorRegistry`] entry.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod pipeline;
pub mod poll;
pub mod record;
pub mod registry;
pub mod router;
pub mod server;
pub mod sink;

pub use config::Config;
pub use credentials::CredentialStore;
pub use error::{GatewayError, PollError, Result, SinkError};
pub use hub::{BatchSummary, Hub, HubRunner, PollSummary};
pub use pipeline::{BatchPartitioner, VendorClassifier, enrich};
pub use poll::{MtsSmartAdapter, PollingAdapter, VemconAdapter};
pub use record::{EnrichedRecord, RawRecord, SourceMeta, TriggerBatch, TriggerMetadata};
pub use registry::{VendorEntry, VendorRegistry};
pub use router::{OutputRouter, RouteReport};
pub use sink::Sink;
