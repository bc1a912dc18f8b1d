//! Event envelope codec.
//!
//! Every event travelling through a queue, a webhook or the event store is
//! wrapped as `{"type": "<tag>", "data": <payload>}`. The tag selects the
//! concrete payload type on the way back in.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope carries a tag no known event uses.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The envelope or its payload is not valid JSON for the expected shape.
    #[error("malformed {what}: {source}")]
    Malformed {
        /// Which part failed to decode.
        what: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Wire and storage wrapper around a single event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Tag of the concrete event carried in `data`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The event payload.
    pub data: serde_json::Value,
}

/// A concrete event payload that can travel inside an envelope.
pub trait EventData: Serialize + DeserializeOwned + Send + Sync {
    /// Envelope tag for this payload.
    const EVENT_TYPE: &'static str;

    /// Unique identifier of this event.
    fn event_id(&self) -> Uuid;
}

impl EventEnvelope {
    /// Wraps a payload under its own tag.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the payload cannot be represented as JSON.
    pub fn wrap<E: EventData>(event: &E) -> Result<Self, CodecError> {
        let data = serde_json::to_value(event).map_err(|source| CodecError::Malformed {
            what: format!("{} payload", E::EVENT_TYPE),
            source,
        })?;
        Ok(Self {
            event_type: E::EVENT_TYPE.to_owned(),
            data,
        })
    }

    /// Parses raw bytes into an envelope without looking at the payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the bytes are not an envelope.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(raw).map_err(|source| CodecError::Malformed {
            what: "event envelope".to_owned(),
            source,
        })
    }

    /// Encodes the envelope to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|source| CodecError::Malformed {
            what: "event envelope".to_owned(),
            source,
        })
    }

    /// Decodes the payload as `E`. The caller is expected to have matched
    /// on `event_type` already; a mismatching tag is reported as unknown.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventType` on a tag mismatch and
    /// `CodecError::Malformed` if the payload does not fit `E`.
    pub fn into_event<E: EventData>(self) -> Result<E, CodecError> {
        if self.event_type != E::EVENT_TYPE {
            return Err(CodecError::UnknownEventType(self.event_type));
        }
        serde_json::from_value(self.data).map_err(|source| CodecError::Malformed {
            what: format!("{} payload", E::EVENT_TYPE),
            source,
        })
    }
}

/// Serializes a payload into envelope bytes.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if encoding fails.
pub fn serialize<E: EventData>(event: &E) -> Result<Vec<u8>, CodecError> {
    EventEnvelope::wrap(event)?.encode()
}
