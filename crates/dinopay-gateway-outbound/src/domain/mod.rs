//! Domain layer for the outbound payments context.

pub mod events;
pub mod replay;
pub mod status;
