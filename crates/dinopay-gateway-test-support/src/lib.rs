//! Shared test mocks and utilities for the DinoPay gateway.

mod clients;
mod clock;
mod event_store;
mod ids;

pub use clients::{Failure, RecordingDinopayClient, RecordingPaymentsClient, StubAccountsClient};
pub use clock::FixedClock;
pub use event_store::{FailingEventStore, RecordedAppend, RecordingEventStore};
pub use ids::SequentialIds;
