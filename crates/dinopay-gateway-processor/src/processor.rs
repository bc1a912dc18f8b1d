//! The message processor state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use dinopay_gateway_core::error::ProcessingError;
use dinopay_gateway_core::event::{Deserializer, Dispatch, EventSet};
use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};

use crate::callback::{ErrorCallback, log_processing_error};

/// Lifecycle of a [`MessageProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Built but not started.
    Created,
    /// Pulling and handling messages.
    Running,
    /// Stopped; cannot be restarted.
    Stopped,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Errors from starting or stopping a processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The requested transition is not valid from the current state.
    #[error("cannot {operation} a processor that is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the processor was in.
        state: ProcessorState,
    },

    /// The message source failed to start or close.
    #[error(transparent)]
    Consumer(#[from] ConsumerError),
}

/// Pulls messages from a consumer and dispatches them to a handler.
pub struct MessageProcessor<C, D, H> {
    consumer: C,
    deserializer: Arc<D>,
    handler: Arc<H>,
    on_error: ErrorCallback,
    span: tracing::Span,
    state: ProcessorState,
    task: Option<JoinHandle<()>>,
}

impl<C, D, H> MessageProcessor<C, D, H>
where
    C: MessageConsumer,
    D: Deserializer + 'static,
    D::Event: Dispatch<H> + 'static,
    H: Send + Sync + 'static,
{
    /// Creates a processor in the `Created` state. Everything it logs is
    /// recorded inside `span`.
    pub fn new(consumer: C, deserializer: D, handler: Arc<H>, span: tracing::Span) -> Self {
        Self {
            consumer,
            deserializer: Arc::new(deserializer),
            handler,
            on_error: Arc::new(log_processing_error),
            span,
            state: ProcessorState::Created,
            task: None,
        }
    }

    /// Replaces the default logging error callback.
    #[must_use]
    pub fn with_error_callback(mut self, on_error: ErrorCallback) -> Self {
        self.on_error = on_error;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Starts consuming and spawns the processing loop.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError::InvalidState` unless the processor is
    /// `Created`, and `ProcessorError::Consumer` if the source fails to start.
    pub async fn start(&mut self) -> Result<(), ProcessorError> {
        if self.state != ProcessorState::Created {
            return Err(ProcessorError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let mut messages = self
            .consumer
            .consume()
            .instrument(self.span.clone())
            .await?;
        self.state = ProcessorState::Running;

        let deserializer = Arc::clone(&self.deserializer);
        let handler = Arc::clone(&self.handler);
        let on_error = Arc::clone(&self.on_error);

        // The loop ends with the stream, which sources end once closed and
        // emptied of what they already accepted.
        let task = tokio::spawn(
            async move {
                tracing::info!("message processor started");
                while let Some(message) = messages.next().await {
                    process(deserializer.as_ref(), handler.as_ref(), &on_error, message).await;
                }
                tracing::info!("message processor loop finished");
            }
            .instrument(self.span.clone()),
        );
        self.task = Some(task);
        Ok(())
    }

    /// Closes the consumer so it accepts nothing new, then waits up to
    /// `drain_timeout` for the in-flight message and any message the source
    /// had already accepted. Whatever is still running when the timeout
    /// expires is aborted.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError::InvalidState` unless the processor is
    /// `Running`, and `ProcessorError::Consumer` if closing the source fails.
    pub async fn stop(&mut self, drain_timeout: Duration) -> Result<(), ProcessorError> {
        if self.state != ProcessorState::Running {
            return Err(ProcessorError::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }
        self.state = ProcessorState::Stopped;
        let closed = self.consumer.close().instrument(self.span.clone()).await;

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(drain_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.span.in_scope(|| {
                        tracing::error!(error = %err, "message processor task failed");
                    });
                }
                Err(_) => {
                    self.span.in_scope(|| {
                        tracing::warn!(
                            drain_timeout_ms = drain_timeout.as_millis(),
                            "drain timeout expired, aborting in-flight message"
                        );
                    });
                    task.abort();
                }
            }
        }

        closed?;
        self.span.in_scope(|| tracing::info!("message processor stopped"));
        Ok(())
    }
}

impl<C, D, H> Drop for MessageProcessor<C, D, H> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn process<D, H>(deserializer: &D, handler: &H, on_error: &ErrorCallback, message: Message)
where
    D: Deserializer,
    D::Event: Dispatch<H>,
    H: Sync,
{
    let event = match deserializer.deserialize(&message.payload) {
        Ok(event) => event,
        Err(err) => {
            on_error(&ProcessingError::from(err).wrap("failed deserializing message"));
            return;
        }
    };

    let event_type = event.event_type();
    tracing::debug!(event_type, "dispatching event");
    if let Err(err) = event.dispatch(handler).await {
        on_error(&err.wrap(format!("failed handling {event_type}")));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tokio::sync::mpsc;
    use tracing_test::traced_test;
    use uuid::Uuid;

    use dinopay_gateway_core::envelope::{self, CodecError, EventData, EventEnvelope};
    use dinopay_gateway_core::error::ErrorKind;
    use dinopay_gateway_core::event::{EnvelopeDeserializer, EventSet};
    use dinopay_gateway_transport::channel::ChannelConsumer;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ping {
        id: Uuid,
        label: String,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        fail: bool,
    }

    impl EventData for Ping {
        const EVENT_TYPE: &'static str = "Ping";

        fn event_id(&self) -> Uuid {
            self.id
        }
    }

    #[derive(Debug)]
    enum TestEvent {
        Ping(Ping),
    }

    impl EventSet for TestEvent {
        fn from_envelope(envelope: EventEnvelope) -> Result<Self, CodecError> {
            match envelope.event_type.as_str() {
                Ping::EVENT_TYPE => Ok(Self::Ping(envelope.into_event()?)),
                _ => Err(CodecError::UnknownEventType(envelope.event_type)),
            }
        }

        fn to_envelope(&self) -> Result<EventEnvelope, CodecError> {
            match self {
                Self::Ping(ping) => EventEnvelope::wrap(ping),
            }
        }

        fn event_type(&self) -> &'static str {
            match self {
                Self::Ping(_) => Ping::EVENT_TYPE,
            }
        }
    }

    #[derive(Debug, Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatch<RecordingHandler> for TestEvent {
        async fn dispatch(self, handler: &RecordingHandler) -> Result<(), ProcessingError> {
            match self {
                Self::Ping(ping) => {
                    if ping.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(ping.delay_ms)).await;
                    }
                    if ping.fail {
                        return Err(ProcessingError::Retryable(format!("{} failed", ping.label)));
                    }
                    handler.seen.lock().unwrap().push(ping.label);
                    Ok(())
                }
            }
        }
    }

    type TestProcessor =
        MessageProcessor<ChannelConsumer, EnvelopeDeserializer<TestEvent>, RecordingHandler>;

    fn ping(label: &str) -> Ping {
        Ping {
            id: Uuid::new_v4(),
            label: label.to_owned(),
            delay_ms: 0,
            fail: false,
        }
    }

    fn message(ping: &Ping) -> Message {
        Message::new(envelope::serialize(ping).unwrap())
    }

    fn build(
        handler: &Arc<RecordingHandler>,
    ) -> (mpsc::Sender<Message>, TestProcessor, Arc<Mutex<Vec<ErrorKind>>>) {
        let (sender, consumer) = ChannelConsumer::new(16);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let processor = MessageProcessor::new(
            consumer,
            EnvelopeDeserializer::new(),
            Arc::clone(handler),
            tracing::info_span!("test-processor", component = "test"),
        )
        .with_error_callback(Arc::new(move |err: &ProcessingError| {
            sink.lock().unwrap().push(err.kind());
        }));
        (sender, processor, errors)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_processes_messages_in_order_and_survives_undecodable_message() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, mut processor, errors) = build(&handler);
        processor.start().await.unwrap();

        // Act
        sender.send(message(&ping("first"))).await.unwrap();
        sender.send(Message::new(b"not json".to_vec())).await.unwrap();
        sender
            .send(Message::new(br#"{"type":"Bogus","data":{}}"#.to_vec()))
            .await
            .unwrap();
        sender.send(message(&ping("second"))).await.unwrap();

        // Assert
        wait_until(|| handler.seen().len() == 2).await;
        assert_eq!(handler.seen(), vec!["first", "second"]);
        assert_eq!(
            *errors.lock().unwrap(),
            vec![ErrorKind::NonRetryable, ErrorKind::NonRetryable]
        );
        processor.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_handler_error_goes_to_callback_with_its_kind() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, mut processor, errors) = build(&handler);
        processor.start().await.unwrap();
        let mut failing = ping("boom");
        failing.fail = true;

        // Act
        sender.send(message(&failing)).await.unwrap();
        sender.send(message(&ping("after"))).await.unwrap();

        // Assert
        wait_until(|| handler.seen().len() == 1).await;
        assert_eq!(*errors.lock().unwrap(), vec![ErrorKind::Retryable]);
        processor.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (_sender, mut processor, _errors) = build(&handler);
        processor.start().await.unwrap();

        // Act
        let result = processor.start().await;

        // Assert
        assert!(matches!(
            result,
            Err(ProcessorError::InvalidState {
                operation: "start",
                state: ProcessorState::Running
            })
        ));
        processor.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_invalid() {
        let handler = Arc::new(RecordingHandler::default());
        let (_sender, mut processor, _errors) = build(&handler);

        let result = processor.stop(Duration::from_secs(1)).await;

        assert!(matches!(
            result,
            Err(ProcessorError::InvalidState {
                state: ProcessorState::Created,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_stop_drains_in_flight_message() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, mut processor, _errors) = build(&handler);
        processor.start().await.unwrap();
        let mut slow = ping("slow");
        slow.delay_ms = 100;
        sender.send(message(&slow)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        processor.stop(Duration::from_secs(2)).await.unwrap();

        // Assert
        assert_eq!(handler.seen(), vec!["slow"]);
        assert_eq!(processor.state(), ProcessorState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_drains_accepted_messages_and_refuses_new_ones() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, mut processor, _errors) = build(&handler);
        processor.start().await.unwrap();
        let mut slow = ping("slow");
        slow.delay_ms = 100;
        sender.send(message(&slow)).await.unwrap();
        sender.send(message(&ping("queued"))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        processor.stop(Duration::from_secs(2)).await.unwrap();
        let late = sender.send(message(&ping("late"))).await;

        // Assert
        assert_eq!(handler.seen(), vec!["slow", "queued"]);
        assert!(late.is_err());
    }

    #[tokio::test]
    async fn test_stop_aborts_in_flight_message_after_drain_timeout() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, mut processor, _errors) = build(&handler);
        processor.start().await.unwrap();
        let mut stuck = ping("stuck");
        stuck.delay_ms = 10_000;
        sender.send(message(&stuck)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        let started = tokio::time::Instant::now();
        processor.stop(Duration::from_millis(50)).await.unwrap();

        // Assert
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(handler.seen().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_default_callback_logs_failure() {
        // Arrange
        let handler = Arc::new(RecordingHandler::default());
        let (sender, consumer) = ChannelConsumer::new(4);
        let mut processor = MessageProcessor::new(
            consumer,
            EnvelopeDeserializer::<TestEvent>::new(),
            Arc::clone(&handler),
            tracing::info_span!("test-processor", component = "test"),
        );
        processor.start().await.unwrap();

        // Act
        sender.send(Message::new(b"{}".to_vec())).await.unwrap();
        sender.send(message(&ping("next"))).await.unwrap();
        wait_until(|| handler.seen().len() == 1).await;

        // Assert
        assert!(logs_contain("failed processing message"));
        assert!(logs_contain("retryable=false"));
        processor.stop(Duration::from_secs(1)).await.unwrap();
    }
}
