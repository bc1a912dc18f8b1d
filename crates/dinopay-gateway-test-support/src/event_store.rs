//! Test event stores.

use std::sync::Mutex;

use async_trait::async_trait;
use dinopay_gateway_core::error::EventStoreError;
use dinopay_gateway_core::event_store::{EventStore, ExpectedVersion, NewEvent, RawEvent};
use dinopay_gateway_event_store::InMemoryEventStore;

/// One recorded `append_events` call.
#[derive(Debug, Clone)]
pub struct RecordedAppend {
    /// Target stream.
    pub stream: String,
    /// Asserted version.
    pub expected: ExpectedVersion,
    /// Appended events.
    pub events: Vec<NewEvent>,
}

/// An in-memory event store that records every append and read.
#[derive(Debug, Default)]
pub struct RecordingEventStore {
    inner: InMemoryEventStore,
    appended: Mutex<Vec<RecordedAppend>>,
    reads: Mutex<Vec<(String, Option<u64>, usize)>>,
}

impl RecordingEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying store, for seeding streams or inspecting them.
    #[must_use]
    pub fn inner(&self) -> &InMemoryEventStore {
        &self.inner
    }

    /// Returns a snapshot of all successful appends.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended(&self) -> Vec<RecordedAppend> {
        self.appended.lock().unwrap().clone()
    }

    /// Returns `(stream, before, limit)` for every backwards read.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reads(&self) -> Vec<(String, Option<u64>, usize)> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn append_events(
        &self,
        stream: &str,
        expected: ExpectedVersion,
        events: &[NewEvent],
    ) -> Result<u64, EventStoreError> {
        let revision = self.inner.append_events(stream, expected, events).await?;
        self.appended.lock().unwrap().push(RecordedAppend {
            stream: stream.to_owned(),
            expected,
            events: events.to_vec(),
        });
        Ok(revision)
    }

    async fn read_events_backwards(
        &self,
        stream: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawEvent>, EventStoreError> {
        self.reads
            .lock()
            .unwrap()
            .push((stream.to_owned(), before, limit));
        self.inner.read_events_backwards(stream, before, limit).await
    }
}

/// An event store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append_events(
        &self,
        _stream: &str,
        _expected: ExpectedVersion,
        _events: &[NewEvent],
    ) -> Result<u64, EventStoreError> {
        Err(EventStoreError::Infrastructure("connection refused".into()))
    }

    async fn read_events_backwards(
        &self,
        _stream: &str,
        _before: Option<u64>,
        _limit: usize,
    ) -> Result<Vec<RawEvent>, EventStoreError> {
        Err(EventStoreError::Infrastructure("connection refused".into()))
    }
}
