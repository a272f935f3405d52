//! Key-value persistence: the single shared mutable resource of the service.
//!
//! Keys are plain strings (`invoice:<id>`, `owner:<owner>:invoice:<id>`),
//! values are opaque strings. Backends must treat every failure as transient:
//! an I/O error is never reported as an absent key.

mod memory;
mod redis_store;
mod retry;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use retry::{RetryPolicy, RetryingStore};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not complete the operation. Safe to retry.
    #[error("store operation failed: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Unconditional overwrite.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Stored value, or `None` when the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Values of every key starting with `prefix`, in no particular order.
    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Create-only write. Returns `false` (and leaves the value untouched)
    /// when the key already exists.
    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
}
