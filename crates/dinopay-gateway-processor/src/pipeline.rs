//! Type-erased processor lifecycle.

use std::time::Duration;

use async_trait::async_trait;

use dinopay_gateway_core::event::{Deserializer, Dispatch};
use dinopay_gateway_core::message::MessageConsumer;

use crate::processor::{MessageProcessor, ProcessorError};

/// Start/stop surface shared by every [`MessageProcessor`], so processors
/// over different consumers and event sets can be held in one collection.
#[async_trait]
pub trait Pipeline: Send {
    /// See [`MessageProcessor::start`].
    async fn start(&mut self) -> Result<(), ProcessorError>;

    /// See [`MessageProcessor::stop`].
    async fn stop(&mut self, drain_timeout: Duration) -> Result<(), ProcessorError>;
}

#[async_trait]
impl<C, D, H> Pipeline for MessageProcessor<C, D, H>
where
    C: MessageConsumer,
    D: Deserializer + 'static,
    D::Event: Dispatch<H> + 'static,
    H: Send + Sync + 'static,
{
    async fn start(&mut self) -> Result<(), ProcessorError> {
        MessageProcessor::start(self).await
    }

    async fn stop(&mut self, drain_timeout: Duration) -> Result<(), ProcessorError> {
        MessageProcessor::stop(self, drain_timeout).await
    }
}
