//! Shared request plumbing.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use dinopay_gateway_core::ports::ClientError;

/// A base URL plus a configured `reqwest` client.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub(crate) fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn patch(&self, path: &str) -> RequestBuilder {
        self.http.patch(self.url(path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends the request and decodes a successful JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = Self::send_checked(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Sends the request and ignores a successful body.
    pub(crate) async fn send(request: RequestBuilder) -> Result<(), ClientError> {
        Self::send_checked(request).await.map(drop)
    }

    async fn send_checked(request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        handle_response(response).await
    }
}

async fn handle_response(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error response".to_owned());
    tracing::debug!(status = status.as_u16(), body, "collaborator rejected request");
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}
