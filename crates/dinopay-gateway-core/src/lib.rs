//! DinoPay Gateway Core: shared abstractions.
//!
//! Error taxonomy, the event envelope, stream naming and the ports every
//! pipeline talks through. It contains no infrastructure code.

pub mod clock;
pub mod envelope;
pub mod error;
pub mod event;
pub mod event_store;
pub mod ids;
pub mod message;
pub mod ports;
pub mod stream;
