//! In-memory sink
//!
//! Keeps every write in process memory for inspection. Nothing is persisted;
//! records are lost on restart.

use crate::error::SinkError;
use crate::record::EnrichedRecord;
use crate::sink::Sink;
use async_trait::async_trait;
use parking_lot::Mutex;

/// One write observed by the sink
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelWrite {
    pub channel: String,
    pub records: Vec<EnrichedRecord>,
}

/// Sink that captures writes in memory
#[derive(Default)]
pub struct MemorySink {
    writes: Mutex<Vec<ChannelWrite>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes, in the order they happened
    pub fn writes(&self) -> Vec<ChannelWrite> {
        self.writes.lock().clone()
    }

    /// Number of writes, empty ones included
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// All records written to a channel, across writes
    pub fn records(&self, channel: &str) -> Vec<EnrichedRecord> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.channel == channel)
            .flat_map(|w| w.records.iter().cloned())
            .collect()
    }

    /// Forget everything captured so far
    pub fn clear(&self) {
        self.writes.lock().clear();
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError> {
        self.writes.lock().push(ChannelWrite {
            channel: channel.to_string(),
            records: records.to_vec(),
        });
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}
