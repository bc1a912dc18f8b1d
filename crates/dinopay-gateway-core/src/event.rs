//! Event sets and handler dispatch.
//!
//! Each pipeline works on a closed set of events modelled as an enum. The
//! enum decodes itself from an envelope and routes each variant to exactly
//! one handler method with a `match`, so a handler that forgets a variant
//! does not compile.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::envelope::{CodecError, EventEnvelope};
use crate::error::ProcessingError;

/// A closed set of events understood by one pipeline.
pub trait EventSet: Sized + Send + std::fmt::Debug {
    /// Decodes an envelope into one of the variants.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventType` for a tag outside the set and
    /// `CodecError::Malformed` for a payload that does not fit its variant.
    fn from_envelope(envelope: EventEnvelope) -> Result<Self, CodecError>;

    /// Wraps the current variant back into an envelope.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the payload cannot be encoded.
    fn to_envelope(&self) -> Result<EventEnvelope, CodecError>;

    /// Envelope tag of the current variant.
    fn event_type(&self) -> &'static str;

    /// Decodes raw envelope bytes.
    ///
    /// # Errors
    ///
    /// See [`EventSet::from_envelope`].
    fn deserialize(raw: &[u8]) -> Result<Self, CodecError> {
        Self::from_envelope(EventEnvelope::decode(raw)?)
    }

    /// Encodes the current variant as envelope bytes.
    ///
    /// # Errors
    ///
    /// See [`EventSet::to_envelope`].
    fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        self.to_envelope()?.encode()
    }
}

/// Routes an event to the handler method for its variant.
#[async_trait]
pub trait Dispatch<H: ?Sized + Sync>: EventSet {
    /// Invokes the single handler method matching this variant.
    async fn dispatch(self, handler: &H) -> Result<(), ProcessingError>;
}

/// Turns raw message payloads into typed events.
pub trait Deserializer: Send + Sync {
    /// The event set produced.
    type Event: Send;

    /// Decodes one raw payload.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` when the payload is not a known event.
    fn deserialize(&self, raw: &[u8]) -> Result<Self::Event, CodecError>;
}

/// Deserializer for any [`EventSet`] carried in a standard envelope.
#[derive(Debug)]
pub struct EnvelopeDeserializer<E> {
    _events: PhantomData<fn() -> E>,
}

impl<E> EnvelopeDeserializer<E> {
    /// Creates a new deserializer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _events: PhantomData,
        }
    }
}

impl<E> Default for EnvelopeDeserializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventSet> Deserializer for EnvelopeDeserializer<E> {
    type Event = E;

    fn deserialize(&self, raw: &[u8]) -> Result<E, CodecError> {
        E::deserialize(raw)
    }
}
