//! Telemetry gateway binary
//!
//! ## Usage
//!
//! ```bash
//! # Push path only, records printed to stdout
//! cargo run
//!
//! # Poll Vemcon every 5 minutes and post records to a store
//! GATEWAY_VEMCON_URL=https://api.vemcon.net \
//! GATEWAY_CREDENTIALS_PATH=creds.json \
//! GATEWAY_POLL_INTERVAL_SECS=300 \
//! GATEWAY_SINK=webhook GATEWAY_WEBHOOK_URL=http://store:8080/collections \
//! cargo run
//! ```
//!
//! See [`Config`] for every environment variable.

use std::sync::Arc;
use telemetry_gateway::config::{Config, LogFormat, SinkKind};
use telemetry_gateway::metrics::Metrics;
use telemetry_gateway::sink::{MemorySink, ProjectionSink, Sink, StdoutSink, WebhookSink};
use telemetry_gateway::{
    CredentialStore, Hub, MtsSmartAdapter, PollingAdapter, VemconAdapter, VendorRegistry, server,
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        http_addr = %config.http_addr,
        vendors = %config.vendors,
        sink = ?config.sink,
        latest_state = config.latest_state,
        "Starting telemetry gateway"
    );

    Metrics::init()?;

    let registry = VendorRegistry::parse(&config.vendors)?;
    let adapters = build_adapters(&config)?;

    let mut hub = Hub::new(registry)
        .default_sink(build_sink(&config)?)
        .poll_interval(config.poll_interval);
    for adapter in adapters {
        info!(vendor = adapter.vendor(), "Registered polling adapter");
        hub = hub.adapter(adapter);
    }
    let hub = Arc::new(hub.build()?);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let scheduler = tokio::spawn(Arc::clone(&hub).run(async move {
        let _ = stop_rx.changed().await;
    }));

    server::serve(config.http_addr, Arc::clone(&hub), shutdown_signal()).await?;

    let _ = stop_tx.send(true);
    if let Err(e) = scheduler.await {
        error!(error = %e, "Poll scheduler failed");
    }
    hub.shutdown().await;

    info!("Telemetry gateway shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

fn build_sink(config: &Config) -> anyhow::Result<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match config.sink {
        SinkKind::Stdout => Arc::new(StdoutSink::pretty()),
        SinkKind::Memory => {
            warn!("Memory sink keeps every record in process memory");
            Arc::new(MemorySink::new())
        }
        SinkKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GATEWAY_WEBHOOK_URL is not set"))?;
            Arc::new(WebhookSink::new(url)?)
        }
    };

    if config.latest_state {
        info!("Latest-state projection enabled");
        Ok(Arc::new(ProjectionSink::wrap(sink)))
    } else {
        Ok(sink)
    }
}

fn build_adapters(config: &Config) -> anyhow::Result<Vec<Arc<dyn PollingAdapter>>> {
    if !config.polling_enabled() {
        return Ok(Vec::new());
    }

    let path = config
        .credentials_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("GATEWAY_CREDENTIALS_PATH is not set"))?;
    let store = CredentialStore::from_file(path)?;
    info!(hosts = store.len(), path = %path.display(), "Loaded credentials");

    let mut adapters: Vec<Arc<dyn PollingAdapter>> = Vec::new();
    if let Some(url) = &config.mts_smart_url {
        adapters.push(Arc::new(MtsSmartAdapter::from_store(
            url.as_str(),
            &store,
            config.poll_timeout,
        )?));
    }
    if let Some(url) = &config.vemcon_url {
        adapters.push(Arc::new(VemconAdapter::from_store(
            url.as_str(),
            &store,
            config.poll_timeout,
        )?));
    }
    Ok(adapters)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
