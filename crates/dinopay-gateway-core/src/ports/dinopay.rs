//! DinoPay payments API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, ClientError};

/// Body of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Amount in major units.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Account debited on DinoPay.
    pub source_account: Account,
    /// Account credited on DinoPay.
    pub destination_account: Account,
    /// Our own payment id, echoed back by DinoPay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_transaction_id: Option<String>,
}

/// The payment DinoPay created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DinopayPayment {
    /// DinoPay payment id.
    pub id: Uuid,
    /// DinoPay's status string, mapped later.
    pub status: String,
}

/// Client for the DinoPay API.
#[async_trait]
pub trait DinopayClient: Send + Sync {
    /// Asks DinoPay to execute a payment.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` when the request fails or is rejected.
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<DinopayPayment, ClientError>;
}
