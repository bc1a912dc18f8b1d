//! DinoPay Gateway: service wiring.
//!
//! Builds the four dispatch pipelines (ledger queue, DinoPay webhook,
//! outbound streams, inbound streams) around shared collaborators and runs
//! them until shutdown.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod telemetry;
