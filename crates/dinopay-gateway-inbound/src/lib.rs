//! DinoPay Gateway: inbound payments context.
//!
//! Owns the `inboundPayment` streams. Money that arrives on one of our
//! DinoPay accounts is recorded here as `InboundPaymentReceived` and then
//! registered in the ledger as a confirmed inbound payment.

pub mod application;
pub mod domain;
