//! Message source abstraction.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// A raw message delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Undecoded envelope bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a message from raw bytes.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Errors raised by a message source.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The source could not be reached or subscribed to.
    #[error("failed to connect message source: {0}")]
    Connect(String),

    /// `consume` was called more than once.
    #[error("message source already consumed")]
    AlreadyConsumed,

    /// Releasing the source failed.
    #[error("failed to close message source: {0}")]
    Close(String),
}

/// Source of messages for a single pipeline.
#[async_trait]
pub trait MessageConsumer: Send {
    /// Starts delivery. The stream ends when the source is closed.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Connect` if delivery cannot begin and
    /// `ConsumerError::AlreadyConsumed` on a second call.
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError>;

    /// Releases the source.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Close` if the source fails to shut down cleanly.
    async fn close(&mut self) -> Result<(), ConsumerError>;
}
