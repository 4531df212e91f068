//! Freightlane Backend Server
//!
//! HTTP API for trips and bookings, plus the background expiry sweep and the
//! notification outbox worker.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use freightlane_server::auth::JwtVerifier;
use freightlane_server::booking::{BookingService, BookingSettings};
use freightlane_server::config::Config;
use freightlane_server::db::{self, Database};
use freightlane_server::geocode::{CachedGeocoder, Geocoder, HttpGeocoder};
use freightlane_server::middleware::{self, RateLimiter};
use freightlane_server::notification::{
    EmailRelay, NotificationChannel, NotificationWorker, Notifier, WsChannel,
};
use freightlane_server::payment::{PaymentGateway, PaystackClient};
use freightlane_server::routes;
use freightlane_server::state::AppState;
use freightlane_server::store::{BookingStore, NotificationOutbox, NotificationQueue, PgStore};
use freightlane_server::trip::{start_expiry_sweep, TripService};
use freightlane_server::websocket::WsState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting Freightlane API");

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(PgStore::new(db_pool.clone()));
    let ws_state = WsState::new();
    let gateway_timeout = Duration::from_secs(config.gateway_timeout_secs);

    let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackClient::new(
        config.paystack_base_url.clone(),
        &config.paystack_secret_key,
        gateway_timeout,
        config.payment_callback_url.clone(),
    )?);

    let upstream: Arc<dyn Geocoder> = Arc::new(HttpGeocoder::new(
        config.geocoder_url.clone(),
        gateway_timeout,
    )?);
    let geocoder = Arc::new(CachedGeocoder::new(
        upstream,
        Duration::from_secs(config.geocode_cache_ttl_secs),
        config.geocode_cache_capacity,
    ));

    let booking_store: Arc<dyn BookingStore> = store.clone();
    let outbox: Arc<dyn NotificationOutbox> = store.clone();
    let queue: Arc<dyn NotificationQueue> = store.clone();

    let trip_service = Arc::new(TripService::new(booking_store.clone()));
    let booking_service = Arc::new(BookingService::new(
        booking_store.clone(),
        gateway,
        geocoder.clone(),
        Notifier::new(outbox),
        BookingSettings::from_config(&config),
    ));

    // Notification delivery
    let mut channels: Vec<Arc<dyn NotificationChannel>> =
        vec![Arc::new(WsChannel::new(ws_state.clone()))];
    if let Some(url) = &config.email_relay_url {
        channels.push(Arc::new(EmailRelay::new(url.clone(), gateway_timeout)?));
        tracing::info!("Email relay enabled");
    }
    let worker = NotificationWorker::new(
        queue.clone(),
        channels,
        Duration::from_secs(config.notification_poll_secs),
        config.notification_batch_size,
        config.notification_max_attempts,
    );
    tokio::spawn(worker.run());

    // Trip expiry sweep
    let mut scheduler = start_expiry_sweep(trip_service.clone(), &config.expiry_sweep_cron).await?;

    if config.payment_webhook_secret.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, payment webhooks will be refused");
    }

    let app_state = AppState {
        trip_service,
        booking_service,
        inbox: queue,
        geocoder,
        ws_state,
        jwt: JwtVerifier::new(&config.jwt_secret, config.jwt_issuer.as_deref()),
        webhook_secret: config.payment_webhook_secret.clone(),
        database: Some(Database::new(db_pool)),
    };

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    rate_limiter.spawn_cleanup(Duration::from_secs(60), Duration::from_secs(300));

    let mut app = routes::api_router(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_layer(limiter)(req, next)
        }))
        .layer(configure_cors(&config));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Expiry sweep scheduler did not stop cleanly: {:?}", e);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed = config.cors_allowed_origins.as_deref().unwrap_or_default();

    if allowed.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
