//! Accounts directory API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ClientError;

/// A customer account known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAccount {
    /// Account id.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
}

/// Client for the accounts directory.
#[async_trait]
pub trait AccountsClient: Send + Sync {
    /// Lists the accounts bound to a DinoPay account number.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` when the request fails or is rejected.
    async fn find_by_dinopay_account_number(
        &self,
        account_number: &str,
    ) -> Result<Vec<CustomerAccount>, ClientError>;
}
