//! Stdout sink for debugging
//!
//! Prints records to stdout, one line per record or as a framed block.
//! Useful for development and debugging.

use crate::error::SinkError;
use crate::record::EnrichedRecord;
use crate::sink::Sink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout sink - prints records for debugging
pub struct StdoutSink {
    /// Print a framed block with the full JSON document
    pretty: bool,
    /// Count of records written
    written_count: AtomicU64,
}

impl StdoutSink {
    /// Create a new StdoutSink
    pub fn new() -> Self {
        Self {
            pretty: false,
            written_count: AtomicU64::new(0),
        }
    }

    /// Create a new StdoutSink with pretty printing
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            written_count: AtomicU64::new(0),
        }
    }

    /// Get total records written
    pub fn written_count(&self) -> u64 {
        self.written_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();

        for record in records {
            if self.pretty {
                let body = serde_json::to_string_pretty(record)
                    .map_err(|e| SinkError::Send(format!("serialize record: {e}")))?;
                writeln!(
                    stdout,
                    "┌─ {channel} ─────────────────────────────────────────",
                )
                .ok();
                writeln!(stdout, "│ Device:   {}", record.device_id()).ok();
                writeln!(stdout, "│ Vendor:   {}", record.device_vendor()).ok();
                writeln!(stdout, "│ Enqueued: {}", record.enqueued_time_utc()).ok();
                for line in body.lines() {
                    writeln!(stdout, "│ {line}").ok();
                }
                writeln!(
                    stdout,
                    "└─────────────────────────────────────────────────────",
                )
                .ok();
            } else {
                writeln!(
                    stdout,
                    "[{}] {}:{} @ {} ({} fields)",
                    channel,
                    record.device_vendor(),
                    record.device_id(),
                    record.enqueued_time_utc(),
                    record.as_map().len()
                )
                .ok();
            }
        }

        self.written_count
            .fetch_add(records.len() as u64, Ordering::Relaxed);

        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}
