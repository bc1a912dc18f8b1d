//! Message sources.
//!
//! Each source implements `MessageConsumer` and yields raw envelope bytes:
//! a NATS queue subscription, the DinoPay webhook listener, and an mpsc
//! channel for tests and in-process producers.

pub mod channel;
pub mod nats;
pub mod webhook;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};

use dinopay_gateway_core::message::Message;

/// Streams messages from `receiver`. Once `shutdown` flips to `true` the
/// channel is closed to new sends and the stream ends after yielding what is
/// still buffered.
pub(crate) fn receiver_stream(
    receiver: mpsc::Receiver<Message>,
    shutdown: watch::Receiver<bool>,
) -> BoxStream<'static, Message> {
    futures::stream::unfold(
        (receiver, shutdown),
        |(mut receiver, mut shutdown)| async move {
            if !*shutdown.borrow() {
                tokio::select! {
                    message = receiver.recv() => {
                        return message.map(|message| (message, (receiver, shutdown)));
                    }
                    _ = shutdown.changed() => {}
                }
            }
            receiver.close();
            let message = receiver.recv().await?;
            Some((message, (receiver, shutdown)))
        },
    )
    .boxed()
}
