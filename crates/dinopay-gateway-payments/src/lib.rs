//! DinoPay Gateway: ledger payments context.
//!
//! Consumes the payments ledger's events from the queue and turns each
//! outbound payment into a DinoPay payment, recording the result on the
//! payment's `outboundPayment` stream.

pub mod application;
pub mod domain;
