//! In-process channel source.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};

use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};

use crate::receiver_stream;

/// Consumer fed by an mpsc sender.
#[derive(Debug)]
pub struct ChannelConsumer {
    receiver: Option<mpsc::Receiver<Message>>,
    shutdown: watch::Sender<bool>,
}

impl ChannelConsumer {
    /// Creates a consumer with a bounded buffer and the sender that feeds it.
    #[must_use]
    pub fn new(buffer: usize) -> (mpsc::Sender<Message>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        let (shutdown, _) = watch::channel(false);
        (
            sender,
            Self {
                receiver: Some(receiver),
                shutdown,
            },
        )
    }
}

#[async_trait]
impl MessageConsumer for ChannelConsumer {
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError> {
        let receiver = self.receiver.take().ok_or(ConsumerError::AlreadyConsumed)?;
        Ok(receiver_stream(receiver, self.shutdown.subscribe()))
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.shutdown.send_replace(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_delivers_sent_messages_then_ends_on_close() {
        // Arrange
        let (sender, mut consumer) = ChannelConsumer::new(4);
        let mut messages = consumer.consume().await.unwrap();

        // Act
        sender.send(Message::new(b"one".to_vec())).await.unwrap();
        let first = messages.next().await;
        consumer.close().await.unwrap();
        let after_close = tokio::time::timeout(Duration::from_secs(1), messages.next())
            .await
            .unwrap();

        // Assert
        assert_eq!(first, Some(Message::new(b"one".to_vec())));
        assert_eq!(after_close, None);
    }

    #[tokio::test]
    async fn test_close_delivers_buffered_messages_and_refuses_new_ones() {
        // Arrange
        let (sender, mut consumer) = ChannelConsumer::new(4);
        let mut messages = consumer.consume().await.unwrap();
        sender.send(Message::new(b"one".to_vec())).await.unwrap();
        sender.send(Message::new(b"two".to_vec())).await.unwrap();

        // Act
        consumer.close().await.unwrap();
        let first = messages.next().await;
        let refused = sender.send(Message::new(b"three".to_vec())).await;
        let second = messages.next().await;
        let end = messages.next().await;

        // Assert
        assert_eq!(first, Some(Message::new(b"one".to_vec())));
        assert!(refused.is_err());
        assert_eq!(second, Some(Message::new(b"two".to_vec())));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_ends_when_all_senders_drop() {
        let (sender, mut consumer) = ChannelConsumer::new(4);
        let mut messages = consumer.consume().await.unwrap();

        drop(sender);

        assert_eq!(messages.next().await, None);
    }

    #[tokio::test]
    async fn test_consume_twice_is_rejected() {
        let (_sender, mut consumer) = ChannelConsumer::new(4);
        let _messages = consumer.consume().await.unwrap();

        let second = consumer.consume().await;

        assert!(matches!(second, Err(ConsumerError::AlreadyConsumed)));
    }
}
