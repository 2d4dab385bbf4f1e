//! NotificationFanOut - Routes booking notifications to live audiences.
//!
//! Notifications arrive from two paths: the `booking.created` bus
//! subscription and reminder jobs calling [`BookingNotifier::notify`]. The
//! real-time transport usually becomes ready after the first notifications
//! could arrive, so the service starts detached and buffers them.
//!
//! ## Attach
//!
//! The latch and its buffer sit behind one mutex. `attach_gateway` flips the
//! latch and drains the buffer in FIFO order under that lock, and `notify`
//! takes the same lock, so no notification is lost or delivered twice
//! across the switch.
//!
//! ## Subscription
//!
//! Once attached, a background task subscribes to the bus. Failed attempts
//! and ended streams are retried on a fixed interval, forever. Failures never
//! reach callers; they are logged.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::audience::AudienceGroup;
use crate::domain::booking::{Booking, BookingCreated, BOOKING_CREATED_CHANNEL};
use crate::ports::{AudienceBroadcaster, BookingNotifier, EventBus};

/// Configuration for the fan-out service.
#[derive(Debug, Clone)]
pub struct FanOutConfig {
    /// Bus channel carrying booking creations.
    pub channel: String,

    /// Wait between subscription attempts.
    pub retry_interval: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            channel: BOOKING_CREATED_CHANNEL.to_string(),
            retry_interval: Duration::from_secs(5),
        }
    }
}

impl FanOutConfig {
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

enum Latch {
    Detached { pending: VecDeque<Booking> },
    Attached { gateway: Arc<dyn AudienceBroadcaster> },
}

/// Fan-out service between the bus, the reminder path, and live audiences.
pub struct NotificationFanOut {
    latch: Mutex<Latch>,
    bus: Arc<dyn EventBus>,
    config: FanOutConfig,
    subscription: StdMutex<Option<JoinHandle<()>>>,
    subscribed: AtomicBool,
}

impl NotificationFanOut {
    pub fn new(bus: Arc<dyn EventBus>) -> Arc<Self> {
        Self::with_config(bus, FanOutConfig::default())
    }

    pub fn with_config(bus: Arc<dyn EventBus>, config: FanOutConfig) -> Arc<Self> {
        Arc::new(Self {
            latch: Mutex::new(Latch::Detached {
                pending: VecDeque::new(),
            }),
            bus,
            config,
            subscription: StdMutex::new(None),
            subscribed: AtomicBool::new(false),
        })
    }

    /// Makes `gateway` the delivery target, flushes everything buffered so
    /// far, and starts the bus subscription if it is not running.
    ///
    /// Attaching again replaces the gateway.
    pub async fn attach_gateway(self: &Arc<Self>, gateway: Arc<dyn AudienceBroadcaster>) {
        {
            let mut latch = self.latch.lock().await;
            let previous = std::mem::replace(
                &mut *latch,
                Latch::Attached {
                    gateway: Arc::clone(&gateway),
                },
            );

            match previous {
                Latch::Detached { pending } => {
                    tracing::info!(buffered = pending.len(), "Gateway attached, draining buffer");
                    for booking in &pending {
                        broadcast(gateway.as_ref(), booking).await;
                    }
                }
                Latch::Attached { .. } => {
                    tracing::info!("Gateway replaced");
                }
            }
        }

        self.ensure_subscription();
    }

    /// Spawns the subscription loop unless one is already running.
    pub fn ensure_subscription(self: &Arc<Self>) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let service = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { service.run_subscription().await }));
    }

    async fn run_subscription(self: Arc<Self>) {
        let channel = self.config.channel.clone();
        let retry = self.config.retry_interval;

        loop {
            match self.bus.subscribe(&channel).await {
                Ok(mut messages) => {
                    self.subscribed.store(true, Ordering::SeqCst);
                    tracing::info!(channel = %channel, "Booking notifications subscribed");

                    while let Some(payload) = messages.next().await {
                        self.on_bus_message(&payload).await;
                    }

                    self.subscribed.store(false, Ordering::SeqCst);
                    tracing::warn!(
                        channel = %channel,
                        retry_secs = retry.as_secs_f64(),
                        "Booking notification subscription ended, retrying"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        error = %e,
                        retry_secs = retry.as_secs_f64(),
                        "Booking notification subscription failed, retrying"
                    );
                }
            }

            tokio::time::sleep(retry).await;
        }
    }

    /// Handles one raw payload from the bus. Malformed payloads are logged
    /// and dropped.
    pub async fn on_bus_message(&self, payload: &str) {
        match BookingCreated::from_payload(payload) {
            Ok(event) => self.notify(event.booking).await,
            Err(e) => {
                tracing::warn!(channel = %self.config.channel, error = %e, "Dropping malformed booking event");
            }
        }
    }

    /// Delivers now when attached, otherwise buffers.
    pub async fn notify(&self, booking: Booking) {
        let mut latch = self.latch.lock().await;
        match &mut *latch {
            Latch::Detached { pending } => {
                tracing::debug!(booking_id = %booking.id, buffered = pending.len() + 1, "Gateway not attached, buffering");
                pending.push_back(booking);
            }
            Latch::Attached { gateway } => {
                broadcast(gateway.as_ref(), &booking).await;
            }
        }
    }

    /// Stops the subscription loop. Safe to call more than once.
    pub fn shutdown(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Notification fan-out stopped");
        }
        self.subscribed.store(false, Ordering::SeqCst);
    }

    pub async fn pending_len(&self) -> usize {
        match &*self.latch.lock().await {
            Latch::Detached { pending } => pending.len(),
            Latch::Attached { .. } => 0,
        }
    }

    pub async fn is_attached(&self) -> bool {
        matches!(&*self.latch.lock().await, Latch::Attached { .. })
    }

    /// True while a bus subscription stream is open.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookingNotifier for NotificationFanOut {
    async fn notify(&self, booking: Booking) {
        NotificationFanOut::notify(self, booking).await;
    }
}

/// Sends to the admin group and the booking's provider group. Each group
/// is attempted independently; failures are logged.
async fn broadcast(gateway: &dyn AudienceBroadcaster, booking: &Booking) {
    for group in AudienceGroup::for_booking(booking) {
        match gateway.deliver(group, booking).await {
            Ok(recipients) => {
                tracing::debug!(booking_id = %booking.id, group = %group, recipients, "Booking notification sent");
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, group = %group, error = %e, "Booking notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::domain::booking::{BookingStatus, ServiceType};
    use crate::domain::foundation::{BookingId, Timestamp, UserId};
    use crate::ports::{BusConnectionState, DeliveryError};

    /// Gateway that records deliveries and can fail one group.
    #[derive(Default)]
    struct RecordingGateway {
        delivered: StdMutex<Vec<(AudienceGroup, BookingId)>>,
        failing: Option<AudienceGroup>,
    }

    impl RecordingGateway {
        fn failing_for(group: AudienceGroup) -> Self {
            Self {
                delivered: StdMutex::new(Vec::new()),
                failing: Some(group),
            }
        }

        fn delivered(&self) -> Vec<(AudienceGroup, BookingId)> {
            self.delivered.lock().unwrap().clone()
        }

        fn delivered_ids(&self, group: AudienceGroup) -> Vec<i64> {
            self.delivered()
                .into_iter()
                .filter(|(g, _)| *g == group)
                .map(|(_, id)| id.as_i64())
                .collect()
        }
    }

    #[async_trait]
    impl AudienceBroadcaster for RecordingGateway {
        async fn deliver(&self, group: AudienceGroup, booking: &Booking) -> Result<usize, DeliveryError> {
            if self.failing == Some(group) {
                return Err(DeliveryError::Transport("socket layer down".to_string()));
            }
            self.delivered.lock().unwrap().push((group, booking.id));
            Ok(1)
        }
    }

    fn booking(id: i64) -> Booking {
        let start = Timestamp::from_unix_secs(1_900_000_000);
        Booking {
            id: BookingId::from_raw(id),
            user_id: UserId::from_raw(1),
            provider_id: UserId::from_raw(7),
            service_type: ServiceType::Consultation,
            start_time: start,
            end_time: start.plus_minutes(60),
            status: BookingStatus::Confirmed,
            created_at: start,
            updated_at: start,
        }
    }

    fn payload(id: i64) -> String {
        BookingCreated::new(booking(id)).to_payload().unwrap()
    }

    fn provider() -> AudienceGroup {
        AudienceGroup::Provider(UserId::from_raw(7))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn buffers_until_attached_then_drains_in_order() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        for id in 1..=3 {
            fan_out.notify(booking(id)).await;
        }
        assert_eq!(fan_out.pending_len().await, 3);

        let gateway = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(gateway.clone()).await;

        assert_eq!(gateway.delivered_ids(AudienceGroup::Admins), vec![1, 2, 3]);
        assert_eq!(gateway.delivered_ids(provider()), vec![1, 2, 3]);
        assert_eq!(fan_out.pending_len().await, 0);
        assert!(fan_out.is_attached().await);
        fan_out.shutdown();
    }

    #[tokio::test]
    async fn notify_after_attach_delivers_immediately() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        let gateway = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(gateway.clone()).await;

        fan_out.notify(booking(4)).await;

        assert_eq!(
            gateway.delivered(),
            vec![(AudienceGroup::Admins, BookingId::from_raw(4)), (provider(), BookingId::from_raw(4))]
        );
        fan_out.shutdown();
    }

    #[tokio::test]
    async fn reattach_does_not_redeliver_buffer() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        fan_out.notify(booking(1)).await;

        let first = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(first.clone()).await;
        let second = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(second.clone()).await;
        fan_out.notify(booking(2)).await;

        assert_eq!(first.delivered_ids(AudienceGroup::Admins), vec![1]);
        assert_eq!(second.delivered_ids(AudienceGroup::Admins), vec![2]);
        fan_out.shutdown();
    }

    #[tokio::test]
    async fn concurrent_notifies_during_attach_are_delivered_exactly_once() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        let gateway = Arc::new(RecordingGateway::default());

        let mut tasks = Vec::new();
        for id in 1..=50 {
            let fan_out = Arc::clone(&fan_out);
            tasks.push(tokio::spawn(async move { fan_out.notify(booking(id)).await }));
        }
        fan_out.attach_gateway(gateway.clone()).await;
        for task in tasks {
            task.await.unwrap();
        }

        let mut ids = gateway.delivered_ids(AudienceGroup::Admins);
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
        fan_out.shutdown();
    }

    #[tokio::test]
    async fn failing_group_does_not_block_the_other() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        let gateway = Arc::new(RecordingGateway::failing_for(AudienceGroup::Admins));
        fan_out.attach_gateway(gateway.clone()).await;

        fan_out.notify(booking(9)).await;

        assert_eq!(gateway.delivered(), vec![(provider(), BookingId::from_raw(9))]);
        fan_out.shutdown();
    }

    #[tokio::test]
    async fn malformed_bus_message_is_dropped() {
        let fan_out = NotificationFanOut::new(Arc::new(InMemoryEventBus::new()));
        let gateway = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(gateway.clone()).await;

        fan_out.on_bus_message("{\"not\":\"a booking\"}").await;
        fan_out.on_bus_message(&payload(3)).await;

        assert_eq!(gateway.delivered_ids(AudienceGroup::Admins), vec![3]);
        fan_out.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn subscribes_once_connected_and_forwards_bus_messages() {
        let bus = Arc::new(InMemoryEventBus::new());
        let fan_out = NotificationFanOut::new(bus.clone());
        let gateway = Arc::new(RecordingGateway::default());

        fan_out.attach_gateway(gateway.clone()).await;
        settle().await;
        assert!(!fan_out.is_subscribed());

        // Broker stays down for a while; retries continue without errors.
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(5)).await;
            settle().await;
        }
        assert!(bus.subscribe_attempts() >= 4);
        assert!(!fan_out.is_subscribed());

        bus.set_state(BusConnectionState::Connected);
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(fan_out.is_subscribed());

        bus.publish(BOOKING_CREATED_CHANNEL, &payload(11)).await.unwrap();
        settle().await;
        assert_eq!(gateway.delivered_ids(AudienceGroup::Admins), vec![11]);
        fan_out.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribes_after_stream_ends() {
        let bus = Arc::new(InMemoryEventBus::connected());
        let fan_out = NotificationFanOut::new(bus.clone());
        let gateway = Arc::new(RecordingGateway::default());
        fan_out.attach_gateway(gateway.clone()).await;
        settle().await;
        assert!(fan_out.is_subscribed());

        bus.sever_subscriptions();
        settle().await;
        assert!(!fan_out.is_subscribed());

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(fan_out.is_subscribed());
        assert_eq!(bus.subscribe_attempts(), 2);

        bus.publish(BOOKING_CREATED_CHANNEL, &payload(12)).await.unwrap();
        settle().await;
        assert_eq!(gateway.delivered_ids(provider()), vec![12]);
        fan_out.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent_and_stops_retrying() {
        let bus = Arc::new(InMemoryEventBus::new());
        let fan_out = NotificationFanOut::new(bus.clone());
        fan_out.attach_gateway(Arc::new(RecordingGateway::default())).await;
        settle().await;

        fan_out.shutdown();
        fan_out.shutdown();
        let attempts = bus.subscribe_attempts();

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(bus.subscribe_attempts(), attempts);
    }
}
