//! Domain layer for the DinoPay webhook context.

pub mod events;
