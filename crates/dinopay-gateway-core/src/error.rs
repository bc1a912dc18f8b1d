//! Error taxonomy shared by every pipeline.

use thiserror::Error;

use crate::envelope::CodecError;
use crate::event_store::ExpectedVersion;

/// Classification attached to every processing failure.
///
/// The classification is advisory: pipelines report it through their error
/// callback but never retry on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input that will never succeed as-is.
    Validation,
    /// Transient failure of a downstream call.
    Retryable,
    /// A logical invariant was violated.
    NonRetryable,
}

/// Error returned by every event handler.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The input was malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A downstream call failed in a way that may succeed later.
    #[error("retryable internal error: {0}")]
    Retryable(String),

    /// A logical invariant was violated.
    #[error("non-retryable internal error: {0}")]
    NonRetryable(String),

    /// A collaborator error with added context. Inherits the inner kind.
    #[error("{context}: {source}")]
    Wrapped {
        /// What was being attempted.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Returns the classification of this error, looking through wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Retryable(_) => ErrorKind::Retryable,
            Self::NonRetryable(_) => ErrorKind::NonRetryable,
            Self::Wrapped { source, .. } => source.kind(),
        }
    }

    /// Whether the upstream transport may usefully redeliver the message.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Adds context while keeping the classification.
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Errors raised by an event store implementation.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed.
    #[error(
        "concurrency conflict on stream {stream}: expected {expected}, stream is at {}",
        describe_revision(.current)
    )]
    Conflict {
        /// The stream that had the conflict.
        stream: String,
        /// The version the caller asserted.
        expected: ExpectedVersion,
        /// The current revision, `None` when the stream does not exist.
        current: Option<u64>,
    },

    /// Stored data could not be decoded.
    #[error("stored event is corrupt: {0}")]
    Corrupt(String),

    /// Connection or persistence failure.
    #[error("event store infrastructure error: {0}")]
    Infrastructure(String),
}

fn describe_revision(current: &Option<u64>) -> String {
    match current {
        Some(revision) => format!("revision {revision}"),
        None => "no stream".to_owned(),
    }
}

impl From<EventStoreError> for ProcessingError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Conflict { .. } | EventStoreError::Corrupt(_) => {
                Self::NonRetryable(err.to_string())
            }
            EventStoreError::Infrastructure(_) => Self::Retryable(err.to_string()),
        }
    }
}

impl From<CodecError> for ProcessingError {
    fn from(err: CodecError) -> Self {
        Self::NonRetryable(err.to_string())
    }
}
