//! Error callbacks invoked for every failed message.

use std::sync::Arc;

use dinopay_gateway_core::error::ProcessingError;

/// Receives every processing failure of a pipeline.
pub type ErrorCallback = Arc<dyn Fn(&ProcessingError) + Send + Sync>;

/// Default callback: logs the failure at error level.
///
/// Runs inside the pipeline span, which carries the `component` field.
pub fn log_processing_error(err: &ProcessingError) {
    tracing::error!(
        error = %err,
        kind = ?err.kind(),
        retryable = err.is_retryable(),
        "failed processing message"
    );
}
