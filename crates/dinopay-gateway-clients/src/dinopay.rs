//! DinoPay API client.

use std::time::Duration;

use async_trait::async_trait;

use dinopay_gateway_core::ports::ClientError;
use dinopay_gateway_core::ports::dinopay::{CreatePaymentRequest, DinopayClient, DinopayPayment};

use crate::http::ApiClient;

/// `reqwest` implementation of [`DinopayClient`].
#[derive(Debug, Clone)]
pub struct HttpDinopayClient {
    api: ApiClient,
}

impl HttpDinopayClient {
    /// Creates a client for the DinoPay API at `base_url`.
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
impl DinopayClient for HttpDinopayClient {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<DinopayPayment, ClientError> {
        ApiClient::send_json(self.api.post("/payments").json(request)).await
    }
}
