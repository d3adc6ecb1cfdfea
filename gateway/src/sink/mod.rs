//! Sink system for the gateway
//!
//! A sink persists enriched records written to a named output channel
//! (a database collection, a queue, an HTTP endpoint, stdout). The
//! [`OutputRouter`](crate::router::OutputRouter) binds each vendor channel to
//! one sink; the same sink may serve several channels.

pub mod memory;
pub mod projection;
pub mod stdout;
pub mod webhook;

use crate::error::SinkError;
use crate::record::EnrichedRecord;
use async_trait::async_trait;

pub use memory::MemorySink;
pub use projection::ProjectionSink;
pub use stdout::StdoutSink;
pub use webhook::WebhookSink;

/// Sink trait - persists records written to a channel
///
/// An empty `records` slice is a valid write: the channel was bound for this
/// invocation but received nothing. Implementations must accept it.
///
/// # Example
///
/// ```ignore
/// struct CollectionSink {
///     client: MyDbClient,
/// }
///
/// #[async_trait]
/// impl Sink for CollectionSink {
///     fn name(&self) -> &'static str { "collection" }
///
///     async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError> {
///         self.client.upsert(channel, records).await?;
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         self.client.ping().await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink name for identification and logging
    fn name(&self) -> &'static str;

    /// Write records bound to `channel`, in order
    async fn write(&self, channel: &str, records: &[EnrichedRecord]) -> Result<(), SinkError>;

    /// Health check for the destination
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// Called when the gateway is shutting down to flush buffers, close connections, etc.
    async fn shutdown(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
