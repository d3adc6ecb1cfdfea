//! Output router
//!
//! Binds vendor groups to the sinks registered for their channels.
//!
//! ```text
//! Partition ──► OutputRouter ──┬─► outputVemcon   ──► sink
//!                              ├─► outputMtsSmart ──► sink
//!                              └─► outputExelonix ──► sink   (bound even when empty)
//! ```
//!
//! Every write is attempted; a failing channel is logged and reported but
//! does not stop delivery to the others. Retrying is the sink's concern.

use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::pipeline::VendorGroup;
use crate::record::EnrichedRecord;
use crate::registry::{VendorEntry, VendorRegistry};
use crate::sink::Sink;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one routing pass
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    /// Channels written, with record counts, in write order
    pub delivered: Vec<ChannelCount>,
    /// Channels whose write failed
    pub failed: Vec<ChannelFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelCount {
    pub channel: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: String,
}

impl RouteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Records delivered across channels
    pub fn delivered_records(&self) -> usize {
        self.delivered.iter().map(|c| c.count).sum()
    }

    /// First failure as an error, if any
    pub fn into_result(self) -> Result<Self> {
        match self.failed.first() {
            Some(failure) => Err(GatewayError::Sink {
                channel: failure.channel.clone(),
                message: failure.error.clone(),
            }),
            None => Ok(self),
        }
    }
}

/// Routes record groups to per-channel sinks
#[derive(Default)]
pub struct OutputRouter {
    bindings: HashMap<String, Arc<dyn Sink>>,
}

impl OutputRouter {
    /// Create a router with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every channel of the registry to one sink
    pub fn for_registry(registry: &VendorRegistry, sink: Arc<dyn Sink>) -> Self {
        let mut router = Self::new();
        for channel in registry.channels() {
            router.bind(channel, Arc::clone(&sink));
        }
        router
    }

    /// Bind a channel to a sink, replacing any previous binding
    pub fn bind(&mut self, channel: impl Into<String>, sink: Arc<dyn Sink>) {
        let channel = channel.into();
        info!(channel = %channel, sink = sink.name(), "Bound output channel");
        self.bindings.insert(channel, sink);
    }

    /// Check if a channel has a sink
    pub fn is_bound(&self, channel: &str) -> bool {
        self.bindings.contains_key(channel)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Ensure every registry channel has a sink
    pub fn validate(&self, registry: &VendorRegistry) -> Result<()> {
        let unbound: Vec<&str> = registry
            .channels()
            .into_iter()
            .filter(|channel| !self.is_bound(channel))
            .collect();
        if unbound.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Config(format!(
                "no sink bound for channel(s): {}",
                unbound.join(", ")
            )))
        }
    }

    /// Write each group to its channel, empty groups included
    pub async fn route(&self, groups: &[VendorGroup]) -> RouteReport {
        let mut report = RouteReport::default();
        for group in groups {
            self.write_channel(&group.channel, &group.records, &mut report)
                .await;
        }
        report
    }

    /// Write one adapter batch to its vendor's channel
    pub async fn route_batch(
        &self,
        vendor: &VendorEntry,
        records: &[EnrichedRecord],
    ) -> RouteReport {
        let mut report = RouteReport::default();
        self.write_channel(vendor.channel_name(), records, &mut report)
            .await;
        report
    }

    async fn write_channel(
        &self,
        channel: &str,
        records: &[EnrichedRecord],
        report: &mut RouteReport,
    ) {
        let Some(sink) = self.bindings.get(channel) else {
            error!(channel = %channel, count = records.len(), "No sink bound for channel");
            metrics::try_record_sink_failure(channel);
            report.failed.push(ChannelFailure {
                channel: channel.to_string(),
                error: "no sink bound".to_string(),
            });
            return;
        };

        match sink.write(channel, records).await {
            Ok(()) => {
                debug!(
                    channel = %channel,
                    sink = sink.name(),
                    count = records.len(),
                    "Channel written"
                );
                metrics::try_record_routed(channel, records.len() as u64);
                report.delivered.push(ChannelCount {
                    channel: channel.to_string(),
                    count: records.len(),
                });
            }
            Err(e) => {
                error!(
                    channel = %channel,
                    sink = sink.name(),
                    error = %e,
                    count = records.len(),
                    "Failed to write channel"
                );
                metrics::try_record_sink_failure(channel);
                report.failed.push(ChannelFailure {
                    channel: channel.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Check health of all bound sinks, by channel
    pub async fn health(&self) -> HashMap<String, bool> {
        let mut health = HashMap::new();
        for (channel, sink) in &self.bindings {
            health.insert(channel.clone(), sink.health().await);
        }
        health
    }

    /// Graceful shutdown of all distinct sinks
    pub async fn shutdown(&self) {
        let mut seen: Vec<&Arc<dyn Sink>> = Vec::new();
        for sink in self.bindings.values() {
            if seen.iter().any(|s| Arc::ptr_eq(s, sink)) {
                continue;
            }
            seen.push(sink);
        }

        info!("Shutting down {} sinks", seen.len());
        for sink in seen {
            if let Err(e) = sink.shutdown().await {
                error!(sink = sink.name(), error = %e, "Error during sink shutdown");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::pipeline::enrich;
    use crate::record::SourceMeta;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn write(&self, _: &str, _: &[EnrichedRecord]) -> std::result::Result<(), SinkError> {
            Err(SinkError::Connection("store unreachable".into()))
        }

        async fn health(&self) -> bool {
            false
        }
    }

    fn record(vendor: &str, id: &str) -> EnrichedRecord {
        let raw = json!({"deviceVendor": vendor});
        enrich(
            raw.as_object().cloned().unwrap(),
            &VendorEntry::new(vendor),
            &SourceMeta::pushed(id, "T"),
        )
    }

    fn group(vendor: &str, channel: &str, records: Vec<EnrichedRecord>) -> VendorGroup {
        VendorGroup {
            vendor: vendor.into(),
            channel: channel.into(),
            records,
        }
    }

    #[tokio::test]
    async fn test_routes_groups_including_empty() {
        let registry = VendorRegistry::parse("A=outA,B=outB").unwrap();
        let memory = Arc::new(MemorySink::new());
        let router = OutputRouter::for_registry(&registry, Arc::clone(&memory) as Arc<dyn Sink>);

        let report = router
            .route(&[
                group("A", "outA", vec![record("A", "d1")]),
                group("B", "outB", vec![]),
            ])
            .await;

        assert!(report.is_success());
        assert_eq!(report.delivered_records(), 1);
        let writes = memory.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].channel, "outA");
        assert_eq!(writes[1].channel, "outB");
        assert!(writes[1].records.is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_channels() {
        let memory = Arc::new(MemorySink::new());
        let mut router = OutputRouter::new();
        router.bind("outA", Arc::new(FailingSink));
        router.bind("outB", Arc::clone(&memory) as Arc<dyn Sink>);

        let report = router
            .route(&[
                group("A", "outA", vec![record("A", "d1")]),
                group("B", "outB", vec![record("B", "d2")]),
            ])
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].channel, "outA");
        assert_eq!(memory.records("outB").len(), 1);
        assert!(matches!(
            report.into_result(),
            Err(GatewayError::Sink { channel, .. }) if channel == "outA"
        ));
    }

    #[tokio::test]
    async fn test_route_batch_binds_vendor_channel_only() {
        let registry = VendorRegistry::with_builtin_vendors();
        let memory = Arc::new(MemorySink::new());
        let router = OutputRouter::for_registry(&registry, Arc::clone(&memory) as Arc<dyn Sink>);

        let vemcon = registry.get("vemcon").unwrap();
        let report = router
            .route_batch(vemcon, &[record("vemcon", "vemcon_1")])
            .await;

        assert!(report.is_success());
        assert_eq!(memory.write_count(), 1);
        assert_eq!(memory.records("outputVemcon").len(), 1);
    }

    #[test]
    fn test_validate_requires_every_channel() {
        let registry = VendorRegistry::parse("A=outA,B=outB").unwrap();
        let mut router = OutputRouter::new();
        router.bind("outA", Arc::new(MemorySink::new()));

        let err = router.validate(&registry).unwrap_err();
        assert!(err.to_string().contains("outB"));

        router.bind("outB", Arc::new(MemorySink::new()));
        assert!(router.validate(&registry).is_ok());
    }

    #[tokio::test]
    async fn test_unbound_channel_reported() {
        let router = OutputRouter::new();
        let report = router.route(&[group("A", "outA", vec![])]).await;
        assert_eq!(report.failed[0].error, "no sink bound");
    }

    #[tokio::test]
    async fn test_health_by_channel() {
        let mut router = OutputRouter::new();
        router.bind("outA", Arc::new(MemorySink::new()));
        router.bind("outB", Arc::new(FailingSink));

        let health = router.health().await;
        assert_eq!(health.get("outA"), Some(&true));
        assert_eq!(health.get("outB"), Some(&false));
    }
}
