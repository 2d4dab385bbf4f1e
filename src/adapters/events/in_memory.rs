//! In-memory event bus for tests and single-process wiring.
//!
//! Mirrors the broker contract over `tokio::sync::broadcast` channels. The
//! connection state is set by the test, so retry paths can be driven without
//! a real broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;

use crate::ports::{BusConnectionState, BusError, BusSubscription, EventBus};

const CHANNEL_CAPACITY: usize = 256;

/// In-memory event bus.
///
/// Features:
/// - Settable connection state
/// - Capture of every accepted publish for assertions
/// - Severing live subscriptions to simulate a dropped connection
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::connected());
/// bus.publish("booking.created", &payload).await?;
/// assert_eq!(bus.published_on("booking.created").len(), 1);
/// ```
pub struct InMemoryEventBus {
    state: RwLock<BusConnectionState>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
    published: RwLock<Vec<(String, String)>>,
    publish_failure: RwLock<Option<String>>,
    subscribe_attempts: AtomicUsize,
}

impl InMemoryEventBus {
    /// Creates a disconnected bus.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BusConnectionState::Disconnected),
            channels: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
            publish_failure: RwLock::new(None),
            subscribe_attempts: AtomicUsize::new(0),
        }
    }

    /// Creates a bus that is already connected.
    pub fn connected() -> Self {
        let bus = Self::new();
        bus.set_state(BusConnectionState::Connected);
        bus
    }

    pub fn set_state(&self, state: BusConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Drops the connection: the state becomes `Disconnected` and every live
    /// subscription stream ends.
    pub fn disconnect(&self) {
        self.set_state(BusConnectionState::Disconnected);
        self.sever_subscriptions();
    }

    /// Ends every live subscription stream without touching the state.
    pub fn sever_subscriptions(&self) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Makes the next publish fail with a broker error.
    pub fn fail_next_publish(&self, reason: impl Into<String>) {
        *self
            .publish_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    // === Test Helpers ===

    /// Every accepted `(channel, payload)` pair, in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads accepted on one channel.
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Number of `subscribe` calls, successful or not.
    pub fn subscribe_attempts(&self) -> usize {
        self.subscribe_attempts.load(Ordering::SeqCst)
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn state(&self) -> BusConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        if !self.state().is_connected() {
            return Err(BusError::NotConnected);
        }

        let forced = self
            .publish_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reason) = forced {
            self.disconnect();
            return Err(BusError::Broker(reason));
        }

        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.to_string(), payload.to_string()));

        // No subscribers is fine; the broker drops the message.
        let _ = self.sender_for(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError> {
        self.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.state().is_connected() {
            return Err(BusError::NotConnected);
        }

        let rx = self.sender_for(channel).subscribe();
        let messages = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(messages.boxed())
    }
}
