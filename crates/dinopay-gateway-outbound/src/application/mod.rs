//! Application layer for the outbound payments context.

pub mod event_handlers;
