//! swarm-store — object storage for job payloads and output artifacts.
//!
//! The bridge stages every inbound payload here before enqueueing a job,
//! and workers resolve the job's [`Locator`] to fetch it and write their
//! output artifact back under a derived key.
//!
//! Objects live in a single redb table keyed by `{bucket}/{key}`, so a
//! bucket is just a key prefix.

pub mod error;
pub mod locator;
pub mod redb_store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use locator::Locator;
pub use redb_store::RedbObjectStore;

/// Bucketed blob storage.
///
/// Calls are synchronous and expected to be short; the fabric calls them
/// directly from async tasks the same way it calls other embedded state.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `bucket/key`, overwriting any existing object.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> StoreResult<Locator>;

    /// Fetch the object at `bucket/key`.
    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Fetch the object a locator points at.
    fn fetch(&self, locator: &Locator) -> StoreResult<Vec<u8>> {
        self.get(&locator.bucket, &locator.key)
    }
}
