//! Payments ledger API.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ClientError;

/// Ledger payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Accepted but not settled.
    Pending,
    /// Settled.
    Confirmed,
    /// Rejected or failed.
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        })
    }
}

/// Whether money leaves or enters a customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Funds arriving from DinoPay.
    Inbound,
    /// Funds sent out through DinoPay.
    Outbound,
}

/// Account details attached to a ledger payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "accountType",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum AccountDetails {
    /// A DinoPay account.
    Dinopay {
        /// Name of the holder.
        account_holder: String,
        /// Account number on DinoPay.
        account_number: String,
    },
    /// An Argentine CVU, which DinoPay cannot pay into.
    Cvu {
        /// The 22-digit CVU.
        cvu: String,
        /// Optional alias.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
}

/// Body of `PATCH /payments/{paymentId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    /// Ledger payment id.
    pub payment_id: Uuid,
    /// DinoPay payment id.
    pub external_id: Uuid,
    /// New status.
    pub status: PaymentStatus,
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    /// Ledger payment id.
    pub id: Uuid,
    /// Amount in major units.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Owner of the account credited or debited.
    pub customer_id: Uuid,
    /// DinoPay payment id.
    pub external_id: Uuid,
    /// Paying side.
    pub debtor: AccountDetails,
    /// Receiving side.
    pub beneficiary: AccountDetails,
    /// Initial status.
    pub status: PaymentStatus,
    /// Direction of the money movement.
    pub direction: Direction,
}

/// Client for the payments ledger.
#[async_trait]
pub trait PaymentsClient: Send + Sync {
    /// Updates the status and external id of an existing payment.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` when the request fails or is rejected.
    async fn patch_payment(&self, update: &PaymentUpdate) -> Result<(), ClientError>;

    /// Registers a new payment.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` when the request fails or is rejected.
    async fn post_payment(&self, payment: &NewPayment) -> Result<(), ClientError>;
}
