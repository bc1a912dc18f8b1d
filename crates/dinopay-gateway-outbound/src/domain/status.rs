//! DinoPay to ledger status mapping.

use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::ports::payments::PaymentStatus;

/// Translates a DinoPay payment status into the ledger's vocabulary.
///
/// The match is exact and case-sensitive.
///
/// # Errors
///
/// Returns `ProcessingError::NonRetryable` for any status DinoPay is not
/// known to emit.
pub fn map_status(dinopay_status: &str) -> Result<PaymentStatus, ProcessingError> {
    match dinopay_status {
        "pending" => Ok(PaymentStatus::Pending),
        "confirmed" => Ok(PaymentStatus::Confirmed),
        "rejected" => Ok(PaymentStatus::Failed),
        other => Err(ProcessingError::NonRetryable(format!(
            "unknown dinopay payment status {other}"
        ))),
    }
}
