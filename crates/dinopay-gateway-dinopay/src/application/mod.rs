//! Application layer for the DinoPay webhook context.

pub mod event_handlers;
