//! DinoPay Gateway: outbound payments context.
//!
//! Owns the `outboundPayment` streams: the events recorded when DinoPay
//! accepts or updates a payment we initiated, the mapping from DinoPay
//! statuses to ledger statuses, and the handler that reflects both back
//! into the ledger.

pub mod application;
pub mod domain;
