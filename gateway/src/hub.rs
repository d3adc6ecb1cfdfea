//! Hub - the invocation driver
//!
//! The Hub wires the vendor registry, sinks and polling adapters together
//! and runs both invocation kinds:
//!
//! ```text
//! push:  TriggerBatch ──► BatchPartitioner ──► OutputRouter ──► sinks (one per vendor)
//! pull:  tick ──► PollingAdapter ──► OutputRouter ──► sink (adapter vendor only)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use telemetry_gateway::{Hub, VendorRegistry, sink::StdoutSink};
//!
//! let hub = Hub::new(VendorRegistry::with_builtin_vendors())
//!     .default_sink(Arc::new(StdoutSink::new()))
//!     .adapter(Arc::new(vemcon))
//!     .build()?;
//! let summary = hub.handle_batch(batch).await;
//! ```

use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::pipeline::{BatchPartitioner, DropStats};
use crate::poll::{self, PollingAdapter};
use crate::record::TriggerBatch;
use crate::registry::{VendorEntry, VendorRegistry};
use crate::router::{OutputRouter, RouteReport};
use crate::sink::Sink;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};
use ulid::Ulid;

/// Default cadence between poll cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Hub builder
pub struct Hub {
    registry: VendorRegistry,
    sinks: HashMap<String, Arc<dyn Sink>>,
    default_sink: Option<Arc<dyn Sink>>,
    adapters: Vec<Arc<dyn PollingAdapter>>,
    poll_interval: Duration,
}

impl Hub {
    /// Create a builder over a vendor registry
    pub fn new(registry: VendorRegistry) -> Self {
        Self {
            registry,
            sinks: HashMap::new(),
            default_sink: None,
            adapters: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Bind one channel to a sink
    pub fn sink(mut self, channel: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        self.sinks.insert(channel.into(), sink);
        self
    }

    /// Sink for every channel without an explicit binding
    pub fn default_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.default_sink = Some(sink);
        self
    }

    /// Add a polling adapter
    ///
    /// Its vendor must be in the registry.
    pub fn adapter(mut self, adapter: Arc<dyn PollingAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Set the poll cadence
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validate bindings and build the runner
    ///
    /// Fails if a registry channel has no sink, or an adapter polls a vendor
    /// the registry does not declare.
    pub fn build(self) -> Result<HubRunner> {
        if self.registry.is_empty() {
            return Err(GatewayError::Config("vendor registry is empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(GatewayError::Config("poll interval must be non-zero".into()));
        }

        let mut router = OutputRouter::new();
        for channel in self.registry.channels() {
            let sink = self
                .sinks
                .get(channel)
                .or(self.default_sink.as_ref())
                .cloned();
            if let Some(sink) = sink {
                router.bind(channel, sink);
            }
        }
        router.validate(&self.registry)?;

        let mut pollers = Vec::with_capacity(self.adapters.len());
        for adapter in self.adapters {
            let vendor = self.registry.get(adapter.vendor()).cloned().ok_or_else(|| {
                GatewayError::Config(format!(
                    "adapter vendor '{}' is not in the vendor registry",
                    adapter.vendor()
                ))
            })?;
            if pollers
                .iter()
                .any(|p: &PolledVendor| p.vendor.tag() == vendor.tag())
            {
                return Err(GatewayError::Config(format!(
                    "more than one adapter for vendor '{}'",
                    vendor.tag()
                )));
            }
            pollers.push(PolledVendor { adapter, vendor });
        }

        let registry = Arc::new(self.registry);
        Ok(HubRunner {
            partitioner: BatchPartitioner::new(Arc::clone(&registry)),
            registry,
            router,
            pollers,
            poll_interval: self.poll_interval,
        })
    }
}

/// An adapter paired with its vendor's registry profile
struct PolledVendor {
    adapter: Arc<dyn PollingAdapter>,
    vendor: VendorEntry,
}

/// Outcome of one push invocation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub invocation: String,
    pub received: usize,
    pub classified: usize,
    pub dropped: DropStats,
    #[serde(flatten)]
    pub routing: RouteReport,
}

/// Outcome of one successful poll cycle
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub invocation: String,
    pub vendor: String,
    pub records: usize,
    #[serde(flatten)]
    pub routing: RouteReport,
}

impl PollSummary {
    /// Metric outcome label: `sink` when the channel write failed
    pub fn outcome(&self) -> &'static str {
        if self.routing.is_success() { "ok" } else { "sink" }
    }
}

/// Built hub: runs push and pull invocations
pub struct HubRunner {
    registry: Arc<VendorRegistry>,
    partitioner: BatchPartitioner,
    router: OutputRouter,
    pollers: Vec<PolledVendor>,
    poll_interval: Duration,
}

impl HubRunner {
    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub fn router(&self) -> &OutputRouter {
        &self.router
    }

    /// Vendor tags with a polling adapter, in registration order
    pub fn polled_vendors(&self) -> Vec<&str> {
        self.pollers.iter().map(|p| p.vendor.tag()).collect()
    }

    /// Handle one push invocation
    ///
    /// Returns `None` for an empty batch: nothing is classified and no sink
    /// is contacted.
    pub async fn handle_batch(&self, batch: TriggerBatch) -> Option<BatchSummary> {
        let invocation = Ulid::new().to_string();
        let span = info_span!("push", invocation = %invocation);

        async move {
            let Some(partition) = self.partitioner.partition(batch) else {
                debug!("Empty batch, nothing to route");
                return None;
            };

            metrics::try_record_received("push", partition.received() as u64);
            for (reason, count) in partition.dropped().by_reason() {
                metrics::try_record_dropped(reason, count as u64);
            }

            let routing = self.router.route(partition.groups()).await;
            info!(
                received = partition.received(),
                classified = partition.classified(),
                dropped = partition.dropped().total(),
                failed_channels = routing.failed.len(),
                "Batch routed"
            );

            Some(BatchSummary {
                invocation: invocation.clone(),
                received: partition.received(),
                classified: partition.classified(),
                dropped: partition.dropped(),
                routing,
            })
        }
        .instrument(span)
        .await
    }

    /// Run one poll cycle for a vendor
    pub async fn run_poll_cycle(&self, vendor: &str) -> Result<PollSummary> {
        let polled = self
            .pollers
            .iter()
            .find(|p| p.vendor.tag() == vendor)
            .ok_or_else(|| GatewayError::Config(format!("no polling adapter for '{vendor}'")))?;
        self.poll_vendor(polled).await
    }

    async fn poll_vendor(&self, polled: &PolledVendor) -> Result<PollSummary> {
        let invocation = Ulid::new().to_string();
        let tag = polled.vendor.tag();
        let span = info_span!("poll", invocation = %invocation, vendor = tag);

        async move {
            let started = Instant::now();
            let records = match poll::poll(polled.adapter.as_ref(), &polled.vendor).await {
                Ok(records) => records,
                Err(e) => {
                    error!(stage = e.stage().as_str(), error = %e, "Poll cycle aborted");
                    metrics::try_record_poll(
                        tag,
                        e.stage().as_str(),
                        started.elapsed().as_secs_f64(),
                    );
                    return Err(GatewayError::from(e));
                }
            };

            metrics::try_record_received("pull", records.len() as u64);
            let routing = self.router.route_batch(&polled.vendor, &records).await;
            let summary = PollSummary {
                invocation: invocation.clone(),
                vendor: tag.to_string(),
                records: records.len(),
                routing,
            };
            metrics::try_record_poll(tag, summary.outcome(), started.elapsed().as_secs_f64());
            info!(
                records = summary.records,
                channel = polled.vendor.channel_name(),
                failed_channels = summary.routing.failed.len(),
                outcome = summary.outcome(),
                "Poll cycle complete"
            );

            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Poll every adapter on the configured cadence until `shutdown` resolves
    ///
    /// The first cycle of each adapter runs immediately. Missed ticks are
    /// skipped. Failed cycles are logged and retried on the next tick.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        if self.pollers.is_empty() {
            info!("No polling adapters configured");
            shutdown.await;
            return;
        }

        info!(
            adapters = self.pollers.len(),
            interval_secs = self.poll_interval.as_secs(),
            "Poll scheduler started"
        );

        let handles: Vec<_> = (0..self.pollers.len())
            .map(|index| {
                let hub = Arc::clone(&self);
                tokio::spawn(async move { hub.poll_loop(index).await })
            })
            .collect();

        shutdown.await;
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            match handle.await {
                Err(e) if !e.is_cancelled() => warn!(error = %e, "Poll task ended abnormally"),
                _ => {}
            }
        }
        info!("Poll scheduler stopped");
    }

    async fn poll_loop(&self, index: usize) {
        let Some(polled) = self.pollers.get(index) else {
            return;
        };
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            // failures are logged inside the cycle
            let _ = self.poll_vendor(polled).await;
        }
    }

    /// Shut down every bound sink
    pub async fn shutdown(&self) {
        self.router.shutdown().await;
    }
}
