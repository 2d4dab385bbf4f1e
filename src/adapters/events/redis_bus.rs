//! Redis event bus.
//!
//! Publishing goes through one multiplexed connection. Each subscription
//! opens its own pub/sub connection, because a Redis connection in
//! subscriber mode cannot issue other commands.
//!
//! ## Connection lifecycle
//!
//! `connect()` moves the bus `Disconnected -> Connecting -> Connected`. Any
//! transport error on either half drops it back to `Disconnected`; the
//! supervisor loop started with [`RedisEventBus::run_supervisor`] then
//! reconnects on a fixed interval.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;
use tokio::sync::{watch, Mutex};
use tokio::time;

use crate::ports::{BusConnectionState, BusError, BusSubscription, EventBus};

/// Event bus backed by Redis pub/sub.
pub struct RedisEventBus {
    client: redis::Client,
    state: Arc<RwLock<BusConnectionState>>,
    publisher: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisEventBus {
    /// Creates a disconnected bus for `url`. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(broker_error)?;
        Ok(Self {
            client,
            state: Arc::new(RwLock::new(BusConnectionState::Disconnected)),
            publisher: Mutex::new(None),
            timeout,
        })
    }

    /// Opens the publish connection and verifies it with `PING`.
    pub async fn connect(&self) -> Result<(), BusError> {
        set_state(&self.state, BusConnectionState::Connecting);

        match self.open_publisher().await {
            Ok(conn) => {
                *self.publisher.lock().await = Some(conn);
                set_state(&self.state, BusConnectionState::Connected);
                tracing::info!("Event bus connected");
                Ok(())
            }
            Err(e) => {
                set_state(&self.state, BusConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open_publisher(&self) -> Result<MultiplexedConnection, BusError> {
        let mut conn = time::timeout(self.timeout, self.client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| BusError::Broker("connect timed out".to_string()))?
            .map_err(broker_error)?;

        time::timeout(
            self.timeout,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await
        .map_err(|_| BusError::Broker("PING timed out".to_string()))?
        .map_err(broker_error)?;

        Ok(conn)
    }

    async fn open_subscriber(&self, channel: &str) -> Result<PubSub, BusError> {
        let conn = time::timeout(self.timeout, self.client.get_async_connection())
            .await
            .map_err(|_| BusError::Broker("pub/sub connect timed out".to_string()))?
            .map_err(broker_error)?;

        let mut pubsub = conn.into_pubsub();
        time::timeout(self.timeout, pubsub.subscribe(channel))
            .await
            .map_err(|_| BusError::Broker("SUBSCRIBE timed out".to_string()))?
            .map_err(broker_error)?;

        Ok(pubsub)
    }

    /// Round-trips a `PING` on the publish connection.
    pub async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.publish_connection().await?;
        let result = time::timeout(
            self.timeout,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await;

        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.connection_lost(broker_error(e)).await),
            Err(_) => Err(self
                .connection_lost(BusError::Broker("PING timed out".to_string()))
                .await),
        }
    }

    /// Keeps the bus connected until `shutdown` flips to true.
    ///
    /// Every `interval` the loop reconnects a disconnected bus, or pings a
    /// connected one so that a silently dropped connection is noticed.
    pub async fn run_supervisor(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::debug!("Event bus supervisor stopping");
                        return;
                    }
                }

                _ = ticker.tick() => {
                    match self.state() {
                        BusConnectionState::Disconnected => {
                            if let Err(e) = self.connect().await {
                                tracing::warn!(error = %e, "Event bus reconnect failed");
                            }
                        }
                        BusConnectionState::Connected => {
                            if let Err(e) = self.ping().await {
                                tracing::warn!(error = %e, "Event bus health check failed");
                            }
                        }
                        BusConnectionState::Connecting => {}
                    }
                }
            }
        }
    }

    async fn publish_connection(&self) -> Result<MultiplexedConnection, BusError> {
        if !self.state().is_connected() {
            return Err(BusError::NotConnected);
        }
        self.publisher
            .lock()
            .await
            .clone()
            .ok_or(BusError::NotConnected)
    }

    async fn connection_lost(&self, err: BusError) -> BusError {
        set_state(&self.state, BusConnectionState::Disconnected);
        self.publisher.lock().await.take();
        tracing::warn!(error = %err, "Event bus connection lost");
        err
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    fn state(&self) -> BusConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.publish_connection().await?;

        match time::timeout(self.timeout, conn.publish::<_, _, i64>(channel, payload)).await {
            Ok(Ok(receivers)) => {
                tracing::debug!(channel, receivers, "Published to event bus");
                Ok(())
            }
            Ok(Err(e)) => Err(self.connection_lost(broker_error(e)).await),
            Err(_) => Err(self
                .connection_lost(BusError::Broker("PUBLISH timed out".to_string()))
                .await),
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError> {
        if !self.state().is_connected() {
            return Err(BusError::NotConnected);
        }

        let pubsub = match self.open_subscriber(channel).await {
            Ok(pubsub) => pubsub,
            Err(e) => return Err(self.connection_lost(e).await),
        };
        tracing::info!(channel, "Subscribed to event bus channel");

        let state = Arc::clone(&self.state);
        let channel = channel.to_string();
        let messages = pubsub.into_on_message().boxed();

        let payloads = stream::unfold(messages, move |mut messages| {
            let state = Arc::clone(&state);
            let channel = channel.clone();
            async move {
                loop {
                    match messages.next().await {
                        Some(msg) => match msg.get_payload::<String>() {
                            Ok(payload) => return Some((payload, messages)),
                            Err(e) => {
                                tracing::warn!(channel = %channel, error = %e, "Dropping non-text bus message");
                            }
                        },
                        None => {
                            tracing::warn!(channel = %channel, "Event bus subscription ended");
                            set_state(&state, BusConnectionState::Disconnected);
                            return None;
                        }
                    }
                }
            }
        });

        Ok(payloads.boxed())
    }
}

fn set_state(state: &RwLock<BusConnectionState>, next: BusConnectionState) {
    *state.write().unwrap_or_else(PoisonError::into_inner) = next;
}

fn broker_error(e: redis::RedisError) -> BusError {
    BusError::Broker(e.to_string())
}
