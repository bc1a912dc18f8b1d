//! Accounts directory client.

use std::time::Duration;

use async_trait::async_trait;

use dinopay_gateway_core::ports::ClientError;
use dinopay_gateway_core::ports::accounts::{AccountsClient, CustomerAccount};

use crate::http::ApiClient;

/// `reqwest` implementation of [`AccountsClient`].
#[derive(Debug, Clone)]
pub struct HttpAccountsClient {
    api: ApiClient,
}

impl HttpAccountsClient {
    /// Creates a client for the accounts service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl AccountsClient for HttpAccountsClient {
    async fn find_by_dinopay_account_number(
        &self,
        account_number: &str,
    ) -> Result<Vec<CustomerAccount>, ClientError> {
        let request = self
            .api
            .get("/accounts")
            .query(&[("dinopayAccountNumber", account_number)]);
        ApiClient::send_json(request).await
    }
}
