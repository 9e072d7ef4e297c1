//! Buffered dialogue sources.
//! The primary queue is topped up on demand, the backup reserve is preloaded
//! at startup, and the fallback pool is the canned last resort.

pub mod fallback;
pub mod line;
pub mod queue;
pub mod reserve;
pub mod tasks;

pub use fallback::{PoolError, StaticFallbackPool};
pub use line::DialogueLine;
pub use queue::{DialogueQueue, FetchOutcome, QueueSnapshot, QueueStats};
pub use reserve::{BackupReserve, ReserveSnapshot};
pub use tasks::TaskRegistry;

#[cfg(test)]
pub(crate) mod testing;
