//! Ports to the HTTP collaborators: DinoPay, the payments ledger and the
//! accounts directory.

pub mod accounts;
pub mod dinopay;
pub mod payments;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ProcessingError;

/// Errors raised by a collaborator client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("request failed: {0}")]
    Transport(String),

    /// The collaborator answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed decoding response: {0}")]
    Decode(String),
}

impl From<ClientError> for ProcessingError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(_) => Self::Retryable(err.to_string()),
            ClientError::Status { status, .. } if status >= 500 || status == 429 => {
                Self::Retryable(err.to_string())
            }
            ClientError::Status { .. } | ClientError::Decode(_) => {
                Self::NonRetryable(err.to_string())
            }
        }
    }
}

/// A DinoPay bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Name of the holder.
    pub account_holder: String,
    /// Account number on DinoPay.
    pub account_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_transport_and_server_errors_are_retryable() {
        let transport: ProcessingError = ClientError::Transport("timed out".into()).into();
        let server: ProcessingError = ClientError::Status {
            status: 503,
            body: String::new(),
        }
        .into();

        assert!(transport.is_retryable());
        assert!(server.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err: ProcessingError = ClientError::Status {
            status: 400,
            body: "bad amount".into(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::NonRetryable);
    }
}
