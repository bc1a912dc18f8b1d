//! DinoPay Gateway: DinoPay webhook context.
//!
//! Decodes the notifications DinoPay posts to our webhook and records them
//! on the gateway's own streams: money received becomes an
//! `InboundPaymentReceived`, a status change on a payment we initiated
//! becomes an `ExternalPaymentUpdated`.

pub mod application;
pub mod domain;
