//! Dispatch pipeline.
//!
//! A [`MessageProcessor`] pulls raw messages from a consumer, decodes each
//! into the pipeline's event set and hands it to the handler, strictly one
//! message at a time. Failures are reported through an error callback and
//! never stop the loop.

pub mod callback;
pub mod pipeline;
pub mod processor;

pub use callback::{ErrorCallback, log_processing_error};
pub use pipeline::Pipeline;
pub use processor::{MessageProcessor, ProcessorError, ProcessorState};
