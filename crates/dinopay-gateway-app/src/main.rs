//! DinoPay gateway entry point.

use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use dinopay_gateway_app::config::Config;
use dinopay_gateway_app::error::AppError;
use dinopay_gateway_app::gateway::{CONSUMER_GROUP, Collaborators, Gateway, SHUTDOWN_BUDGET, Sources};
use dinopay_gateway_app::{routes, telemetry};
use dinopay_gateway_clients::{HttpAccountsClient, HttpDinopayClient, HttpPaymentsClient};
use dinopay_gateway_core::clock::SystemClock;
use dinopay_gateway_core::ids::UuidV7Generator;
use dinopay_gateway_core::stream::StreamCategory;
use dinopay_gateway_event_store::PgEventStore;
use dinopay_gateway_transport::nats::NatsConsumer;
use dinopay_gateway_transport::webhook::WebhookConsumer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let telemetry = telemetry::init(otlp_endpoint.as_deref())?;

    tracing::info!("Starting DinoPay gateway");
    let result = run().await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "dinopay-gateway failed");
    }
    telemetry.shutdown();
    result.map_err(Into::into)
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    // Create database connection pool and apply the event store schema.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    let store = PgEventStore::new(pool);

    let mut payments = HttpPaymentsClient::new(&config.payments_url, config.http_timeout)?;
    if let Some(token) = config.payments_api_token {
        payments = payments.with_bearer_token(token);
    }

    let collaborators = Collaborators {
        store: Arc::new(store.clone()),
        dinopay: Arc::new(HttpDinopayClient::new(&config.dinopay_url, config.http_timeout)?),
        payments: Arc::new(payments),
        accounts: Arc::new(HttpAccountsClient::new(&config.accounts_url, config.http_timeout)?),
        ids: Arc::new(UuidV7Generator),
        clock: Arc::new(SystemClock),
        gateway_account: config.gateway_account.into(),
    };

    let sources = Sources {
        payments: NatsConsumer::connect(&config.nats_url, config.nats_subject, CONSUMER_GROUP)
            .await?,
        dinopay: WebhookConsumer::new(config.webhook_addr)
            .with_routes(routes::health::router().layer(TraceLayer::new_for_http())),
        outbound: store.subscribe_to_category(StreamCategory::OutboundPayment, CONSUMER_GROUP),
        inbound: store.subscribe_to_category(StreamCategory::InboundPayment, CONSUMER_GROUP),
    };

    let mut gateway = Gateway::new(collaborators, sources);
    gateway.start().await?;
    tracing::info!(webhook_addr = %config.webhook_addr, "dinopay-gateway running");

    shutdown_signal().await?;
    tracing::info!("shutdown signal received");
    gateway.stop(SHUTDOWN_BUDGET).await
}

async fn shutdown_signal() -> Result<(), AppError> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await?;

    Ok(())
}
