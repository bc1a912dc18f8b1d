//! Event store adapters.
//!
//! `PgEventStore` persists streams in Postgres; `InMemoryEventStore` keeps
//! them in process for tests and local runs. Both offer category
//! subscriptions that deliver every event of a category once per group.

pub mod in_memory;
pub mod pg;

pub use in_memory::{InMemoryCategorySubscription, InMemoryEventStore};
pub use pg::{PgCategorySubscription, PgEventStore};

/// Category prefix of a stream name, or the whole name if it has no `-`.
pub(crate) fn category_of(stream: &str) -> &str {
    stream.split_once('-').map_or(stream, |(prefix, _)| prefix)
}
