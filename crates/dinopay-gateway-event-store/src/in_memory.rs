//! In-process event store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Notify, watch};

use dinopay_gateway_core::error::EventStoreError;
use dinopay_gateway_core::event_store::{EventStore, ExpectedVersion, NewEvent, RawEvent};
use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};
use dinopay_gateway_core::stream::StreamCategory;

use crate::category_of;

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, Vec<RawEvent>>,
    /// Every event in global append order.
    log: Vec<RawEvent>,
    /// Next log index to inspect, per `(category, group)`.
    checkpoints: HashMap<(String, String), usize>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    appended: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Event store kept entirely in memory. Clones share the same streams.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<Inner>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event of a stream in append order.
    #[must_use]
    pub fn stream_events(&self, stream: &str) -> Vec<RawEvent> {
        self.inner
            .state()
            .streams
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Opens a persistent subscription to every stream of `category`.
    ///
    /// Subscriptions sharing a `group` share one checkpoint, so each event is
    /// delivered once per group.
    #[must_use]
    pub fn subscribe_to_category(
        &self,
        category: StreamCategory,
        group: &str,
    ) -> InMemoryCategorySubscription {
        let (shutdown, _) = watch::channel(false);
        InMemoryCategorySubscription {
            inner: Arc::clone(&self.inner),
            category,
            group: group.to_owned(),
            shutdown,
            consumed: false,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_events(
        &self,
        stream: &str,
        expected: ExpectedVersion,
        events: &[NewEvent],
    ) -> Result<u64, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::Infrastructure(format!(
                "refusing empty append to stream {stream}"
            )));
        }

        let last = {
            let mut state = self.inner.state();
            let current = state
                .streams
                .get(stream)
                .and_then(|existing| existing.len().checked_sub(1))
                .map(|revision| revision as u64);

            if !expected.is_satisfied_by(current) {
                return Err(EventStoreError::Conflict {
                    stream: stream.to_owned(),
                    expected,
                    current,
                });
            }

            let first = current.map_or(0, |revision| revision + 1);
            let recorded_at = Utc::now();
            let mut revision = first;
            for event in events {
                let raw = RawEvent {
                    event_id: event.event_id,
                    stream_name: stream.to_owned(),
                    event_type: event.event_type.clone(),
                    revision,
                    data: event.data.clone(),
                    recorded_at,
                };
                state.log.push(raw.clone());
                state.streams.entry(stream.to_owned()).or_default().push(raw);
                revision += 1;
            }
            revision - 1
        };

        self.inner.appended.notify_waiters();
        tracing::debug!(stream, revision = last, "appended events");
        Ok(last)
    }

    async fn read_events_backwards(
        &self,
        stream: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawEvent>, EventStoreError> {
        let state = self.inner.state();
        let Some(events) = state.streams.get(stream) else {
            return Ok(Vec::new());
        };
        Ok(events
            .iter()
            .rev()
            .filter(|event| before.is_none_or(|bound| event.revision < bound))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Persistent category subscription over an [`InMemoryEventStore`].
#[derive(Debug)]
pub struct InMemoryCategorySubscription {
    inner: Arc<Inner>,
    category: StreamCategory,
    group: String,
    shutdown: watch::Sender<bool>,
    consumed: bool,
}

struct Cursor {
    inner: Arc<Inner>,
    key: (String, String),
    shutdown: watch::Receiver<bool>,
}

impl Cursor {
    fn take_next(&self) -> Option<Message> {
        let mut state = self.inner.state();
        let start = state.checkpoints.get(&self.key).copied().unwrap_or(0);
        let found = state.log[start..]
            .iter()
            .position(|event| category_of(&event.stream_name) == self.key.0)
            .map(|offset| start + offset);

        match found {
            Some(index) => {
                let message = Message::new(state.log[index].data.clone());
                state.checkpoints.insert(self.key.clone(), index + 1);
                Some(message)
            }
            None => {
                let end = state.log.len();
                state.checkpoints.insert(self.key.clone(), end);
                None
            }
        }
    }

    async fn next(&mut self) -> Option<Message> {
        loop {
            if *self.shutdown.borrow() {
                return None;
            }
            let appended = self.inner.appended.notified();
            if let Some(message) = self.take_next() {
                return Some(message);
            }
            tokio::select! {
                () = appended => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MessageConsumer for InMemoryCategorySubscription {
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError> {
        if self.consumed {
            return Err(ConsumerError::AlreadyConsumed);
        }
        self.consumed = true;

        let cursor = Cursor {
            inner: Arc::clone(&self.inner),
            key: (self.category.as_str().to_owned(), self.group.clone()),
            shutdown: self.shutdown.subscribe(),
        };
        Ok(futures::stream::unfold(cursor, |mut cursor| async move {
            let message = cursor.next().await?;
            Some((message, cursor))
        })
        .boxed())
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.shutdown.send_replace(true);
        Ok(())
    }
}
