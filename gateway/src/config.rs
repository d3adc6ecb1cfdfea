//! Configuration for the telemetry gateway

use crate::error::{GatewayError, Result};
use crate::registry::DEFAULT_VENDORS;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the gateway
#[derive(Debug, Clone)]
pub struct Config {
    /// Trigger, metrics and health listener
    pub http_addr: SocketAddr,

    /// Vendor registry declaration (`tag` or `tag=channel`, comma separated)
    pub vendors: String,

    /// Credential file for polling adapters
    pub credentials_path: Option<PathBuf>,

    /// Base URL of the MTS Smart portal; enables its adapter
    pub mts_smart_url: Option<String>,

    /// Base URL of the Vemcon API; enables its adapter
    pub vemcon_url: Option<String>,

    /// Cadence of poll cycles
    pub poll_interval: Duration,

    /// Upstream request timeout for adapters
    pub poll_timeout: Duration,

    /// Sink every channel is bound to
    pub sink: SinkKind,

    /// Base URL for the webhook sink
    pub webhook_url: Option<String>,

    /// Stamp `id = deviceId` on every written record
    pub latest_state: bool,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Stdout,
    Webhook,
    Memory,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            vendors: DEFAULT_VENDORS.join(","),
            credentials_path: None,
            mts_smart_url: None,
            vemcon_url: None,
            poll_interval: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(30),
            sink: SinkKind::Stdout,
            webhook_url: None,
            latest_state: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(addr) = lookup("GATEWAY_HTTP_ADDR") {
            config.http_addr = addr
                .parse()
                .map_err(|e| GatewayError::Config(format!("invalid GATEWAY_HTTP_ADDR: {e}")))?;
        }

        if let Some(vendors) = lookup("GATEWAY_VENDORS") {
            config.vendors = vendors;
        }

        config.credentials_path = lookup("GATEWAY_CREDENTIALS_PATH").map(PathBuf::from);
        config.mts_smart_url = non_empty(lookup("GATEWAY_MTS_SMART_URL"));
        config.vemcon_url = non_empty(lookup("GATEWAY_VEMCON_URL"));
        config.webhook_url = non_empty(lookup("GATEWAY_WEBHOOK_URL"));

        if let Some(secs) = lookup("GATEWAY_POLL_INTERVAL_SECS") {
            config.poll_interval = parse_secs("GATEWAY_POLL_INTERVAL_SECS", &secs)?;
        }

        if let Some(secs) = lookup("GATEWAY_POLL_TIMEOUT_SECS") {
            config.poll_timeout = parse_secs("GATEWAY_POLL_TIMEOUT_SECS", &secs)?;
        }

        if let Some(sink) = lookup("GATEWAY_SINK") {
            config.sink = match sink.to_lowercase().as_str() {
                "stdout" => SinkKind::Stdout,
                "webhook" => SinkKind::Webhook,
                "memory" => SinkKind::Memory,
                other => {
                    return Err(GatewayError::Config(format!(
                        "invalid GATEWAY_SINK: {other} (expected 'stdout', 'webhook' or 'memory')"
                    )));
                }
            };
        }

        if let Some(flag) = lookup("GATEWAY_LATEST_STATE") {
            config.latest_state = match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(GatewayError::Config(format!(
                        "invalid GATEWAY_LATEST_STATE: {other} (expected true or false)"
                    )));
                }
            };
        }

        if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(GatewayError::Config(format!(
                        "invalid GATEWAY_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements
    pub fn validate(&self) -> Result<()> {
        if self.sink == SinkKind::Webhook && self.webhook_url.is_none() {
            return Err(GatewayError::Config(
                "GATEWAY_SINK=webhook requires GATEWAY_WEBHOOK_URL".into(),
            ));
        }
        if self.polling_enabled() && self.credentials_path.is_none() {
            return Err(GatewayError::Config(
                "polling adapters require GATEWAY_CREDENTIALS_PATH".into(),
            ));
        }
        Ok(())
    }

    /// Whether any polling adapter is configured
    pub fn polling_enabled(&self) -> bool {
        self.mts_smart_url.is_some() || self.vemcon_url.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid {key}: {e}")))?;
    if secs == 0 {
        return Err(GatewayError::Config(format!("invalid {key}: must be non-zero")));
    }
    Ok(Duration::from_secs(secs))
}
