//! DinoPay Gateway: service error types.

use dinopay_gateway_core::message::ConsumerError;
use dinopay_gateway_core::ports::ClientError;
use dinopay_gateway_processor::ProcessorError;
use thiserror::Error;

/// Startup and shutdown errors for the service.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the event store schema failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Connecting to the message queue failed.
    #[error("message queue error: {0}")]
    Queue(#[from] ConsumerError),

    /// An HTTP collaborator client could not be built.
    #[error("http client error: {0}")]
    Client(#[from] ClientError),

    /// A pipeline failed to start or stop.
    #[error("pipeline {pipeline} failed: {source}")]
    Pipeline {
        /// Component name of the pipeline.
        pipeline: &'static str,
        /// The underlying failure.
        #[source]
        source: ProcessorError,
    },

    /// Tracing or OTLP export could not be initialised.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
