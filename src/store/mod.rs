//! Storage port for experiment state
//!
//! The engine treats storage as named collections of opaque JSON byte
//! records behind the [`StorageBackend`] trait. Two adapters ship with the
//! crate:
//!
//! - [`MemoryBackend`]: volatile, lock-free reads, for tests and embedding
//! - [`JsonlBackend`]: append-only JSONL files, one per collection, replayed
//!   into memory on open
//!
//! The engine keeps its own in-memory working state and only reads storage
//! back on startup, so adapters optimize for append throughput rather than
//! point-read latency.

mod jsonl;
mod memory;

pub use jsonl::JsonlBackend;
pub use memory::MemoryBackend;

use std::future::Future;

use crate::Result;

/// Collection holding one record per experiment, keyed by experiment ID.
pub const EXPERIMENTS: &str = "experiments";

/// Collection holding assignments, keyed `"user_id:experiment_id"`.
pub const ASSIGNMENTS: &str = "assignments";

/// Collection holding tracked events, keyed by event ID.
pub const EVENTS: &str = "events";

/// Key-value storage port consumed by the engine.
///
/// Implementations must be safe for concurrent use; `put` for a key that
/// already exists replaces the visible value (append-only adapters keep the
/// history and let the latest record win on replay).
///
/// # Example
///
/// ```
/// use ensayo::store::{MemoryBackend, StorageBackend, EXPERIMENTS};
///
/// # async fn example() -> ensayo::Result<()> {
/// let store = MemoryBackend::new();
/// store.put(EXPERIMENTS, "exp-1", b"{}".to_vec()).await?;
///
/// let value = store.get(EXPERIMENTS, "exp-1").await?;
/// assert_eq!(value, Some(b"{}".to_vec()));
///
/// let all = store.scan_all(EXPERIMENTS).await?;
/// assert_eq!(all.len(), 1);
/// # Ok(())
/// # }
/// ```
pub trait StorageBackend: Send + Sync {
    /// Store a value under a collection/key pair, replacing any existing
    /// value.
    fn put(
        &self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the value under a collection/key pair, `None` if absent.
    fn get(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Read every `(key, value)` record in a collection, in no particular
    /// order. Unknown collections read as empty.
    fn scan_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<(String, Vec<u8>)>>> + Send;
}
