//! EventBus port - Publish/subscribe transport between the booking
//! coordinator and the notification fan-out.
//!
//! The bus is an at-least-once hop. It tracks the health of its broker
//! connection and refuses work while disconnected instead of queueing.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Connection health of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl BusConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, BusConnectionState::Connected)
    }
}

/// Errors reported by bus operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus is not in the `Connected` state.
    #[error("Event bus is not connected")]
    NotConnected,

    /// The broker rejected the operation or the transport failed.
    #[error("Broker error: {0}")]
    Broker(String),
}

/// Lazy, unbounded sequence of raw payloads for one channel.
///
/// Ends when the underlying connection is lost.
pub type BusSubscription = BoxStream<'static, String>;

/// Port for the message bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Current connection health.
    fn state(&self) -> BusConnectionState;

    /// Hands `payload` to the broker on `channel`.
    ///
    /// Fails with `NotConnected` unless the bus is connected. Returns once
    /// the broker accepted the message.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Opens a subscription on `channel`.
    ///
    /// Fails with `NotConnected` unless the bus is connected. The bus never
    /// resubscribes on its own once the returned stream ends.
    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError>;
}
