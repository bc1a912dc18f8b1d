//! Application layer for the inbound payments context.

pub mod event_handlers;
