use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tourbook_api::{
    app,
    state::{AppState, AuthConfig},
};
use tourbook_booking::{AvailabilityService, CancellationCoordinator, RefundOrchestrator};
use tourbook_core::events::{EventPublisher, NoopPublisher};
use tourbook_core::notification::Mailer;
use tourbook_payment::{select_refund_provider, PaypalClient, PaypalRefundProvider};
use tourbook_store::app_config::Config;
use tourbook_store::{
    DbClient, EventProducer, HttpMailer, LogMailer, RedisClient, StoreBookingLimitRepository,
    StoreBookingRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourbook_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting Tourbook API on port {} ({:?})",
        config.server.port,
        config.environment
    );

    // Postgres
    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let bookings = Arc::new(StoreBookingRepository::new(db.pool.clone()));
    let limits = Arc::new(StoreBookingLimitRepository::new(db.pool.clone()));

    // Redis
    let redis = match RedisClient::new(&config.redis.url).await {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("Redis unavailable, rate limiting disabled: {}", e);
            None
        }
    };

    // Kafka
    let publisher: Arc<dyn EventPublisher> = if config.kafka.brokers.trim().is_empty() {
        tracing::warn!("No Kafka brokers configured, booking events will not be published");
        Arc::new(NoopPublisher)
    } else {
        Arc::new(
            EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?,
        )
    };

    // PayPal
    let paypal = PaypalClient::new(
        &config.paypal.base_url,
        &config.paypal.client_id,
        &config.paypal.client_secret,
    )
    .context("Failed to build PayPal client")?;
    let refunds = select_refund_provider(
        Arc::new(PaypalRefundProvider::new(Arc::new(paypal))),
        config.environment.is_production(),
    );

    // Mail
    let mailer: Arc<dyn Mailer> = match config.mail.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => Arc::new(
            HttpMailer::new(endpoint, config.mail.api_key.clone(), &config.mail.from)
                .context("Failed to build mail client")?,
        ),
        _ => {
            tracing::warn!("No mail relay configured, cancellation emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let availability = AvailabilityService::new(bookings.clone(), limits.clone())
        .with_fallback_capacity(config.booking.fallback_capacity);
    let cancellations = CancellationCoordinator::new(
        bookings,
        RefundOrchestrator::new(refunds, &config.booking.currency),
        mailer,
        publisher,
    )
    .with_default_language(&config.booking.default_language);

    let app_state = AppState {
        availability: Arc::new(availability),
        cancellations: Arc::new(cancellations),
        limits,
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
