//! Application layer for the ledger payments context.

pub mod event_handlers;
