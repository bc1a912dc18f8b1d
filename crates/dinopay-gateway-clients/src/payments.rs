//! Payments ledger client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;

use dinopay_gateway_core::ports::ClientError;
use dinopay_gateway_core::ports::payments::{NewPayment, PaymentUpdate, PaymentsClient};

use crate::http::ApiClient;

/// `reqwest` implementation of [`PaymentsClient`].
#[derive(Debug, Clone)]
pub struct HttpPaymentsClient {
    api: ApiClient,
    token: Option<String>,
}

impl HttpPaymentsClient {
    /// Creates a client for the payments service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new(base_url, timeout)?,
            token: None,
        })
    }

    /// Sends `token` as a bearer credential on every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl PaymentsClient for HttpPaymentsClient {
    async fn patch_payment(&self, update: &PaymentUpdate) -> Result<(), ClientError> {
        let path = format!("/payments/{}", update.payment_id);
        ApiClient::send(self.authorized(self.api.patch(&path)).json(update)).await
    }

    async fn post_payment(&self, payment: &NewPayment) -> Result<(), ClientError> {
        ApiClient::send(self.authorized(self.api.post("/payments")).json(payment)).await
    }
}
