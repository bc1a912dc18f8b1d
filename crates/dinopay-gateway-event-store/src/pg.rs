//! `PostgreSQL` implementation of the `EventStore` trait.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::watch;
use uuid::Uuid;

use dinopay_gateway_core::error::EventStoreError;
use dinopay_gateway_core::event_store::{EventStore, ExpectedVersion, NewEvent, RawEvent};
use dinopay_gateway_core::message::{ConsumerError, Message, MessageConsumer};
use dinopay_gateway_core::stream::StreamCategory;

use crate::category_of;

/// Advisory lock serializing appends so `global_position` becomes visible
/// to pollers in commit order.
const APPEND_LOCK_KEY: i64 = 8_686_001;

/// Rows fetched per subscription poll.
const POLL_BATCH_SIZE: i64 = 100;

/// PostgreSQL-backed event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    poll_interval: Duration,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    global_position: i64,
    event_id: Uuid,
    stream_name: String,
    event_type: String,
    revision: i64,
    data: Vec<u8>,
    recorded_at: DateTime<Utc>,
}

impl EventRow {
    fn into_raw(self) -> Result<RawEvent, EventStoreError> {
        let revision = u64::try_from(self.revision).map_err(|_| {
            EventStoreError::Corrupt(format!(
                "negative revision {} in stream {}",
                self.revision, self.stream_name
            ))
        })?;
        Ok(RawEvent {
            event_id: self.event_id,
            stream_name: self.stream_name,
            event_type: self.event_type,
            revision,
            data: self.data,
            recorded_at: self.recorded_at,
        })
    }
}

fn infrastructure(err: &sqlx::Error) -> EventStoreError {
    EventStoreError::Infrastructure(err.to_string())
}

fn to_db_revision(revision: u64) -> Result<i64, EventStoreError> {
    i64::try_from(revision)
        .map_err(|_| EventStoreError::Infrastructure(format!("revision {revision} out of range")))
}

impl PgEventStore {
    /// Creates a new `PgEventStore` polling subscriptions every 200ms.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            poll_interval: Duration::from_millis(200),
        }
    }

    /// Overrides how often idle subscriptions poll for new events.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Opens a persistent subscription to every stream of `category`.
    #[must_use]
    pub fn subscribe_to_category(
        &self,
        category: StreamCategory,
        group: &str,
    ) -> PgCategorySubscription {
        let (shutdown, _) = watch::channel(false);
        PgCategorySubscription {
            pool: self.pool.clone(),
            category,
            group: group.to_owned(),
            poll_interval: self.poll_interval,
            shutdown,
            consumed: false,
        }
    }

    async fn current_revision(
        tx: &mut Transaction<'_, Postgres>,
        stream: &str,
    ) -> Result<Option<u64>, EventStoreError> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(revision) FROM gateway_events WHERE stream_name = $1")
                .bind(stream)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| infrastructure(&e))?;
        current
            .map(|revision| {
                u64::try_from(revision).map_err(|_| {
                    EventStoreError::Corrupt(format!("negative revision in stream {stream}"))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
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

        let mut tx = self.pool.begin().await.map_err(|e| infrastructure(&e))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| infrastructure(&e))?;

        let current = Self::current_revision(&mut tx, stream).await?;
        if !expected.is_satisfied_by(current) {
            return Err(EventStoreError::Conflict {
                stream: stream.to_owned(),
                expected,
                current,
            });
        }

        let category = category_of(stream);
        let mut revision = current.map_or(0, |revision| revision + 1);
        for event in events {
            sqlx::query(
                r"INSERT INTO gateway_events
                    (event_id, stream_name, category, revision, event_type, data)
                  VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(event.event_id)
            .bind(stream)
            .bind(category)
            .bind(to_db_revision(revision)?)
            .bind(&event.event_type)
            .bind(&event.data)
            .execute(&mut *tx)
            .await
            .map_err(|e| infrastructure(&e))?;
            revision += 1;
        }

        tx.commit().await.map_err(|e| infrastructure(&e))?;
        let last = revision - 1;
        tracing::debug!(stream, revision = last, "appended events");
        Ok(last)
    }

    async fn read_events_backwards(
        &self,
        stream: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawEvent>, EventStoreError> {
        let before = before.map(to_db_revision).transpose()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<EventRow> = sqlx::query_as(
            r"SELECT global_position, event_id, stream_name, event_type, revision, data, recorded_at
              FROM gateway_events
              WHERE stream_name = $1 AND ($2::BIGINT IS NULL OR revision < $2)
              ORDER BY revision DESC
              LIMIT $3",
        )
        .bind(stream)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;

        rows.into_iter().map(EventRow::into_raw).collect()
    }
}

/// Polling persistent subscription over a [`PgEventStore`] category.
///
/// The group checkpoint lives in `gateway_subscription_checkpoints` and is
/// advanced as each event is handed to the consumer.
#[derive(Debug)]
pub struct PgCategorySubscription {
    pool: PgPool,
    category: StreamCategory,
    group: String,
    poll_interval: Duration,
    shutdown: watch::Sender<bool>,
    consumed: bool,
}

struct Poller {
    pool: PgPool,
    category: &'static str,
    group: String,
    poll_interval: Duration,
    position: i64,
    buffer: VecDeque<EventRow>,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    async fn fetch(&mut self) -> Result<(), sqlx::Error> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"SELECT global_position, event_id, stream_name, event_type, revision, data, recorded_at
              FROM gateway_events
              WHERE category = $1 AND global_position > $2
              ORDER BY global_position
              LIMIT $3",
        )
        .bind(self.category)
        .bind(self.position)
        .bind(POLL_BATCH_SIZE)
        .fetch_all(&self.pool)
        .await?;
        self.buffer.extend(rows);
        Ok(())
    }

    async fn advance(&mut self, position: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"UPDATE gateway_subscription_checkpoints
              SET position = $3, updated_at = NOW()
              WHERE category = $1 AND group_name = $2",
        )
        .bind(self.category)
        .bind(&self.group)
        .bind(position)
        .execute(&self.pool)
        .await?;
        self.position = position;
        Ok(())
    }

    /// Waits for the poll interval; returns `false` when shutdown was signalled.
    async fn idle(&mut self) -> bool {
        let woke = tokio::select! {
            () = tokio::time::sleep(self.poll_interval) => true,
            changed = self.shutdown.changed() => changed.is_ok(),
        };
        woke && !*self.shutdown.borrow()
    }

    async fn next(&mut self) -> Option<Message> {
        loop {
            if *self.shutdown.borrow() {
                return None;
            }

            if let Some(row) = self.buffer.front() {
                let position = row.global_position;
                if let Err(err) = self.advance(position).await {
                    tracing::warn!(
                        category = self.category,
                        group = %self.group,
                        error = %err,
                        "failed advancing subscription checkpoint"
                    );
                    if !self.idle().await {
                        return None;
                    }
                    continue;
                }
                let row = self.buffer.pop_front()?;
                return Some(Message::new(row.data));
            }

            if let Err(err) = self.fetch().await {
                tracing::warn!(
                    category = self.category,
                    group = %self.group,
                    error = %err,
                    "failed polling category"
                );
            }
            if self.buffer.is_empty() && !self.idle().await {
                return None;
            }
        }
    }
}

#[async_trait]
impl MessageConsumer for PgCategorySubscription {
    async fn consume(&mut self) -> Result<BoxStream<'static, Message>, ConsumerError> {
        if self.consumed {
            return Err(ConsumerError::AlreadyConsumed);
        }

        let category = self.category.as_str();
        let position: i64 = sqlx::query_scalar(
            r"INSERT INTO gateway_subscription_checkpoints (category, group_name)
              VALUES ($1, $2)
              ON CONFLICT (category, group_name) DO UPDATE SET category = EXCLUDED.category
              RETURNING position",
        )
        .bind(category)
        .bind(&self.group)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ConsumerError::Connect(e.to_string()))?;
        self.consumed = true;

        tracing::info!(category, group = %self.group, position, "category subscription started");

        let poller = Poller {
            pool: self.pool.clone(),
            category,
            group: self.group.clone(),
            poll_interval: self.poll_interval,
            position,
            buffer: VecDeque::new(),
            shutdown: self.shutdown.subscribe(),
        };
        Ok(futures::stream::unfold(poller, |mut poller| async move {
            let message = poller.next().await?;
            Some((message, poller))
        })
        .boxed())
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.shutdown.send_replace(true);
        Ok(())
    }
}
