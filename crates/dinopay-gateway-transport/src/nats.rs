//! NATS queue-group source.

use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;

use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};

/// Consumes one subject as a member of a queue group, so replicas of the
/// gateway share the load.
#[derive(Debug)]
pub struct NatsConsumer {
    client: Client,
    subject: String,
    queue_group: String,
    shutdown: watch::Sender<bool>,
    consumed: bool,
}

impl NatsConsumer {
    /// Wraps an already-connected client.
    #[must_use]
    pub fn new(client: Client, subject: impl Into<String>, queue_group: impl Into<String>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            client,
            subject: subject.into(),
            queue_group: queue_group.into(),
            shutdown,
            consumed: false,
        }
    }

    /// Connects to `url` and builds a consumer.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Connect` if the server is unreachable.
    pub async fn connect(
        url: &str,
        subject: impl Into<String>,
        queue_group: impl Into<String>,
    ) -> Result<Self, ConsumerError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| ConsumerError::Connect(e.to_string()))?;
        Ok(Self::new(client, subject, queue_group))
    }
}

#[async_trait]
impl MessageConsumer for NatsConsumer {
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError> {
        if self.consumed {
            return Err(ConsumerError::AlreadyConsumed);
        }
        let subscriber = self
            .client
            .queue_subscribe(self.subject.clone(), self.queue_group.clone())
            .await
            .map_err(|e| ConsumerError::Connect(e.to_string()))?;
        self.consumed = true;
        tracing::info!(
            subject = %self.subject,
            queue_group = %self.queue_group,
            "subscribed to nats subject"
        );

        let shutdown = self.shutdown.subscribe();
        Ok(futures::stream::unfold(
            (subscriber, shutdown),
            |(mut subscriber, mut shutdown)| async move {
                loop {
                    if *shutdown.borrow() {
                        return None;
                    }
                    tokio::select! {
                        message = subscriber.next() => {
                            let message = Message::new(message?.payload.to_vec());
                            return Some((message, (subscriber, shutdown)));
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                return None;
                            }
                        }
                    }
                }
            },
        )
        .boxed())
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.shutdown.send_replace(true);
        self.client
            .flush()
            .await
            .map_err(|e| ConsumerError::Close(e.to_string()))
    }
}
