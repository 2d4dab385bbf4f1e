//! Integration tests for the booking notification pipeline.
//!
//! Wires the real coordinator, scheduler, fan-out and audience registry
//! over in-memory storage and an in-memory bus:
//! 1. Create → persisted view returned, event published on `booking.created`
//! 2. Bus message → fan-out → admin and provider groups
//! 3. Reminder fires at start minus offset → same groups
//! 4. Notifications raised before the gateway exists are flushed on attach

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

use bookwire::adapters::websocket::{AudienceRegistry, ClientId, Frame};
use bookwire::adapters::{InMemoryBookingRepository, InMemoryEventBus, TokioReminderScheduler};
use bookwire::application::{
    CreateBookingCommand, CreateBookingHandler, FanOutConfig, NotificationFanOut,
};
use bookwire::domain::audience::AudienceGroup;
use bookwire::domain::booking::{BookingCreated, BookingError, ServiceType, BOOKING_CREATED_CHANNEL};
use bookwire::domain::foundation::{BookingId, Timestamp, UserId};
use bookwire::ports::{Clock, FixedClock, ReminderKey, ReminderScheduler};

// =============================================================================
// Test Infrastructure
// =============================================================================

const NOW: i64 = 1_900_000_000;
const PROVIDER: i64 = 7;

struct Pipeline {
    repository: InMemoryBookingRepository,
    bus: Arc<InMemoryEventBus>,
    scheduler: Arc<TokioReminderScheduler>,
    fan_out: Arc<NotificationFanOut>,
    registry: Arc<AudienceRegistry>,
    handler: CreateBookingHandler,
}

impl Pipeline {
    fn new(bus: InMemoryEventBus) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Timestamp::from_unix_secs(NOW)));
        let repository = InMemoryBookingRepository::new();
        let bus = Arc::new(bus);
        let scheduler = Arc::new(TokioReminderScheduler::new(clock.clone()));
        let fan_out = NotificationFanOut::with_config(
            bus.clone(),
            FanOutConfig::default().with_retry_interval(Duration::from_secs(5)),
        );
        let handler = CreateBookingHandler::new(
            Arc::new(repository.clone()),
            bus.clone(),
            scheduler.clone(),
            fan_out.clone(),
            clock,
        );

        Self {
            repository,
            bus,
            scheduler,
            fan_out,
            registry: Arc::new(AudienceRegistry::with_default_capacity()),
            handler,
        }
    }

    async fn attach(&self) {
        self.fan_out.attach_gateway(self.registry.clone()).await;
    }

    async fn listen(&self, group: AudienceGroup) -> broadcast::Receiver<Frame> {
        self.registry.join(group, ClientId::new()).await
    }

    async fn book(&self, start_mins: i64, end_mins: i64) -> Result<i64, BookingError> {
        let now = Timestamp::from_unix_secs(NOW);
        let cmd = CreateBookingCommand {
            provider_id: UserId::from_raw(PROVIDER),
            service_type: ServiceType::Consultation,
            start_time: now.plus_minutes(start_mins),
            end_time: now.plus_minutes(end_mins),
        };
        self.handler
            .handle(cmd, UserId::from_raw(1))
            .await
            .map(|view| view.id.as_i64())
    }

    fn stop(&self) {
        self.fan_out.shutdown();
        self.scheduler.shutdown();
    }
}

fn admins() -> AudienceGroup {
    AudienceGroup::Admins
}

fn provider(id: i64) -> AudienceGroup {
    AudienceGroup::Provider(UserId::from_raw(id))
}

fn parse(frame: Frame) -> Value {
    serde_json::from_str(&frame).expect("frame is JSON")
}

async fn next_frame(rx: &mut broadcast::Receiver<Frame>) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("frame within timeout")
        .expect("group still open");
    parse(frame)
}

async fn wait_for_subscription(bus: &InMemoryEventBus) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while bus.subscriber_count(BOOKING_CREATED_CHANNEL) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fan-out subscribed");
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Bus path
// =============================================================================

#[tokio::test]
async fn created_booking_reaches_admin_and_provider_groups() {
    let pipeline = Pipeline::new(InMemoryEventBus::connected());
    pipeline.attach().await;
    wait_for_subscription(&pipeline.bus).await;

    let mut admin_rx = pipeline.listen(admins()).await;
    let mut provider_rx = pipeline.listen(provider(PROVIDER)).await;
    let mut other_rx = pipeline.listen(provider(8)).await;

    let id = pipeline.book(60, 90).await.unwrap();

    for rx in [&mut admin_rx, &mut provider_rx] {
        let frame = next_frame(rx).await;
        assert_eq!(frame["type"], "booking.created");
        assert_eq!(frame["id"], id);
        assert_eq!(frame["providerId"], PROVIDER);
        assert_eq!(frame["status"], "CONFIRMED");
    }
    assert!(other_rx.try_recv().is_err());

    let published = pipeline.bus.published_on(BOOKING_CREATED_CHANNEL);
    assert_eq!(published.len(), 1);
    let event = BookingCreated::from_payload(&published[0]).unwrap();
    assert_eq!(event.booking.id.as_i64(), id);

    pipeline.stop();
}

#[tokio::test]
async fn malformed_bus_payload_does_not_end_the_subscription() {
    use bookwire::ports::EventBus;

    let pipeline = Pipeline::new(InMemoryEventBus::connected());
    pipeline.attach().await;
    wait_for_subscription(&pipeline.bus).await;
    let mut admin_rx = pipeline.listen(admins()).await;

    pipeline
        .bus
        .publish(BOOKING_CREATED_CHANNEL, "{\"booking\":\"nope\"}")
        .await
        .unwrap();
    let id = pipeline.book(60, 90).await.unwrap();

    let frame = next_frame(&mut admin_rx).await;
    assert_eq!(frame["id"], id);
    assert!(admin_rx.try_recv().is_err());

    pipeline.stop();
}

#[tokio::test]
async fn broker_outage_does_not_fail_creation() {
    let pipeline = Pipeline::new(InMemoryEventBus::new());

    let id = pipeline.book(60, 90).await.unwrap();

    assert_eq!(pipeline.repository.len().await, 1);
    assert!(pipeline.bus.published().is_empty());
    assert!(pipeline
        .scheduler
        .is_scheduled(&ReminderKey::for_booking(BookingId::from_raw(id))));

    pipeline.stop();
}

#[tokio::test]
async fn invalid_time_range_touches_nothing() {
    let pipeline = Pipeline::new(InMemoryEventBus::connected());

    let result = pipeline.book(60, 60).await;

    assert!(matches!(result, Err(BookingError::InvalidTimeRange { .. })));
    assert_eq!(pipeline.repository.create_calls(), 0);
    assert!(pipeline.bus.published().is_empty());
    assert_eq!(pipeline.scheduler.pending_count(), 0);

    pipeline.stop();
}

// =============================================================================
// Reminder path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reminder_fires_ten_minutes_before_start() {
    // Disconnected bus: only the reminder can produce frames.
    let pipeline = Pipeline::new(InMemoryEventBus::new());
    pipeline.attach().await;
    let mut admin_rx = pipeline.listen(admins()).await;
    let mut provider_rx = pipeline.listen(provider(PROVIDER)).await;

    let id = pipeline.book(30, 60).await.unwrap();
    settle().await;
    assert!(admin_rx.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(19 * 60)).await;
    settle().await;
    assert!(admin_rx.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    let frame = parse(admin_rx.try_recv().expect("reminder delivered to admins"));
    assert_eq!(frame["type"], "booking.created");
    assert_eq!(frame["id"], id);
    let frame = parse(provider_rx.try_recv().expect("reminder delivered to provider"));
    assert_eq!(frame["id"], id);
    assert_eq!(pipeline.scheduler.pending_count(), 0);

    pipeline.stop();
}

#[tokio::test(start_paused = true)]
async fn reminders_raised_before_attach_are_flushed_in_order() {
    let pipeline = Pipeline::new(InMemoryEventBus::new());

    // Start times inside the offset: reminders fire immediately.
    let first = pipeline.book(2, 30).await.unwrap();
    settle().await;
    let second = pipeline.book(5, 30).await.unwrap();
    settle().await;
    assert_eq!(pipeline.fan_out.pending_len().await, 2);

    let mut admin_rx = pipeline.listen(admins()).await;
    pipeline.attach().await;

    assert_eq!(parse(admin_rx.try_recv().unwrap())["id"], first);
    assert_eq!(parse(admin_rx.try_recv().unwrap())["id"], second);
    assert!(admin_rx.try_recv().is_err());
    assert_eq!(pipeline.fan_out.pending_len().await, 0);

    pipeline.stop();
}
