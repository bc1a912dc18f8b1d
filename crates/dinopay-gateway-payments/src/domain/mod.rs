//! Domain layer for the ledger payments context.

pub mod events;
