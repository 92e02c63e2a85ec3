//! Inbound event consumption.
//!
//! The message-queue client is an external collaborator behind the
//! [`MessageTransport`] trait (at-least-once delivery assumed). The
//! [`adapter::IngestionAdapter`] subscribes the two event topics, wraps
//! each message in a bounded retry with doubling backoff, and owns the
//! reconnect loop after a fatal consumer fault. [`local::LocalTransport`]
//! is the in-process implementation used by tests and the bundled daemon.

pub mod adapter;
pub mod local;


use async_trait::async_trait;
use std::sync::Arc;

/// Errors from the transport seam.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An operation was attempted before `connect` succeeded.
    #[error("Transport: not connected")]
    NotConnected,

    /// Connecting or subscribing failed.
    #[error("Transport: connection failed: {0}")]
    Connection(String),

    /// The consumer loop died and must be restarted.
    #[error("Transport: consumer fault: {0}")]
    Fatal(String),
}

/// Per-message callback registered for one topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

/// Publish/subscribe transport with at-least-once delivery.
///
/// `run` blocks consuming messages and dispatching them to registered
/// handlers until the transport is disconnected (returns `Ok`) or hits a
/// fatal fault (returns `Err`); the adapter then reconnects and
/// re-subscribes.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), TransportError>;

    async fn run(&self) -> Result<(), TransportError>;

    /// Stops delivering messages without dropping the subscription.
    async fn pause(&self) -> Result<(), TransportError>;

    async fn resume(&self) -> Result<(), TransportError>;

    /// Acknowledges processed offsets, where the backing queue supports it.
    async fn commit(&self) -> Result<(), TransportError>;

    async fn disconnect(&self);
}
