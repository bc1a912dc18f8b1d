//! Domain layer for the inbound payments context.

pub mod events;
