//! Identifier generation.
//!
//! Handlers mint event ids and internal payment ids through this trait so
//! tests can pin them.

use uuid::Uuid;

/// Produces fresh unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier.
    fn next_id(&self) -> Uuid;
}

/// Time-ordered UUIDv7 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> Uuid {
        Uuid::now_v7()
    }
}
