//! DinoPay Gateway: HTTP collaborator clients.
//!
//! `reqwest` implementations of the DinoPay, payments and accounts ports.
//! Every client carries a request timeout and maps non-success responses
//! to `ClientError::Status` with the response body attached.

pub mod accounts;
pub mod dinopay;
mod http;
pub mod payments;

pub use accounts::HttpAccountsClient;
pub use dinopay::HttpDinopayClient;
pub use payments::HttpPaymentsClient;
