//! Event store abstraction.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::envelope::{CodecError, EventData, EventEnvelope};
use crate::error::EventStoreError;

/// Number of events returned by [`EventStore::read_events`].
pub const READ_PAGE_SIZE: usize = 10;

/// Optimistic concurrency assertion made by an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must not exist yet.
    NoStream,
    /// The last event in the stream must have exactly this revision.
    Exact(u64),
    /// No check.
    Any,
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => f.write_str("no stream"),
            Self::Exact(revision) => write!(f, "revision {revision}"),
            Self::Any => f.write_str("any"),
        }
    }
}

impl ExpectedVersion {
    /// Checks the assertion against the current revision of a stream.
    #[must_use]
    pub fn is_satisfied_by(self, current: Option<u64>) -> bool {
        match self {
            Self::NoStream => current.is_none(),
            Self::Exact(expected) => current == Some(expected),
            Self::Any => true,
        }
    }
}

/// An event ready to be appended.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Envelope tag.
    pub event_type: String,
    /// Encoded envelope.
    pub data: Vec<u8>,
}

impl NewEvent {
    /// Encodes a payload into an appendable event.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the payload cannot be encoded.
    pub fn from_event<E: EventData>(event: &E) -> Result<Self, CodecError> {
        Ok(Self {
            event_id: event.event_id(),
            event_type: E::EVENT_TYPE.to_owned(),
            data: EventEnvelope::wrap(event)?.encode()?,
        })
    }
}

/// An event as read back from a stream.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream the event belongs to.
    pub stream_name: String,
    /// Envelope tag.
    pub event_type: String,
    /// Zero-based position within the stream.
    pub revision: u64,
    /// Encoded envelope.
    pub data: Vec<u8>,
    /// When the store recorded the event.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only store of named event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Atomically appends `events` to `stream`, creating it on first append.
    /// Returns the revision of the last appended event.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Conflict` when `expected` does not hold and
    /// `EventStoreError::Infrastructure` on storage failure or an empty batch.
    async fn append_events(
        &self,
        stream: &str,
        expected: ExpectedVersion,
        events: &[NewEvent],
    ) -> Result<u64, EventStoreError>;

    /// Reads up to `limit` events strictly before revision `before` (or from
    /// the end when `None`), newest first. A missing stream reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Infrastructure` on storage failure.
    async fn read_events_backwards(
        &self,
        stream: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawEvent>, EventStoreError>;

    /// Reads the most recent [`READ_PAGE_SIZE`] events, newest first.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Infrastructure` on storage failure.
    async fn read_events(&self, stream: &str) -> Result<Vec<RawEvent>, EventStoreError> {
        self.read_events_backwards(stream, None, READ_PAGE_SIZE).await
    }
}
