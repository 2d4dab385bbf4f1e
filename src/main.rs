//! Bookwire server binary.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookwire::adapters::http::{api_router, BookingHandlers};
use bookwire::adapters::websocket::{gateway_router, AudienceRegistry, GatewayState};
use bookwire::adapters::{JwtTokenVerifier, PostgresBookingRepository, RedisEventBus, TokioReminderScheduler};
use bookwire::application::{
    CreateBookingHandler, FanOutConfig, GetBookingHandler, ListBookingsHandler, NotificationFanOut,
};
use bookwire::config::{AppConfig, ServerConfig};
use bookwire::ports::{BookingRepository, Clock, EventBus, SystemClock, TokenVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    // Storage
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    let repository: Arc<dyn BookingRepository> = Arc::new(PostgresBookingRepository::new(pool));

    // Event bus. Startup continues disconnected; the supervisor keeps retrying.
    let bus = Arc::new(RedisEventBus::new(&config.redis.url, config.redis.timeout())?);
    if let Err(e) = bus.connect().await {
        tracing::warn!(error = %e, "Event bus unavailable at startup");
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor = {
        let bus = bus.clone();
        let interval = config.redis.reconnect_interval();
        tokio::spawn(async move { bus.run_supervisor(interval, shutdown_rx).await })
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(TokioReminderScheduler::new(clock.clone()));
    let fan_out = NotificationFanOut::with_config(
        bus.clone() as Arc<dyn EventBus>,
        FanOutConfig::default().with_retry_interval(config.notifications.subscribe_retry()),
    );

    let handlers = BookingHandlers::new(
        Arc::new(
            CreateBookingHandler::new(
                repository.clone(),
                bus.clone(),
                scheduler.clone(),
                fan_out.clone(),
                clock.clone(),
            )
            .with_reminder_offset(config.notifications.reminder_offset()),
        ),
        Arc::new(GetBookingHandler::new(repository.clone())),
        Arc::new(ListBookingsHandler::new(repository, clock)),
    );

    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtTokenVerifier::new(
        &config.auth.jwt_secret,
        config.auth.leeway_secs,
    ));
    let registry = Arc::new(AudienceRegistry::with_default_capacity());

    let app = Router::new()
        .merge(api_router(handlers, verifier.clone()))
        .merge(gateway_router().with_state(GatewayState::new(registry.clone(), verifier)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    // The gateway exists once the listener is bound; buffered notifications
    // are flushed to it here.
    fan_out.attach_gateway(registry).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    fan_out.shutdown();
    scheduler.shutdown();
    let _ = shutdown_tx.send(true);
    if let Err(e) = supervisor.await {
        tracing::warn!(error = %e, "Event bus supervisor ended abnormally");
    }

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let (json, pretty) = if server.is_production() {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
