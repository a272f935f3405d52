use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{KeyValueStore, StoreError, StoreResult};

/// Bounds on how long a single store operation is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total time budget; once spent, the last error is returned.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_elapsed: Duration::ZERO,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

/// Retries transient failures of the wrapped store with exponential backoff.
///
/// Every operation of the store contract is idempotent by key (including
/// `set_if_absent`, whose result is re-read by callers), so replaying one
/// is safe.
#[derive(Clone)]
pub struct RetryingStore {
    inner: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, op: &'static str, key: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        retry_notify(
            self.policy.backoff(),
            || {
                let fut = call();
                async move { fut.await.map_err(backoff::Error::transient) }
            },
            |err: StoreError, wait: Duration| {
                tracing::warn!(
                    op,
                    key,
                    error = %err,
                    retry_in_ms = wait.as_millis() as u64,
                    "Store operation failed, retrying"
                );
            },
        )
        .await
    }
}

#[async_trait]
impl KeyValueStore for RetryingStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.run("set", key, || self.inner.set(key, value)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.run("get", key, || self.inner.get(key)).await
    }

    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.run("get_by_prefix", prefix, || self.inner.get_by_prefix(prefix))
            .await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.run("set_if_absent", key, || self.inner.set_if_absent(key, value))
            .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls of every operation, then delegates.
    struct FlakyStore {
        inner: MemoryStore,
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn trip(&self) -> StoreResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(StoreError::Unavailable(anyhow::anyhow!("connection reset")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.trip()?;
            self.inner.set(key, value).await
        }

        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.trip()?;
            self.inner.get(key).await
        }

        async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.trip()?;
            self.inner.get_by_prefix(prefix).await
        }

        async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
            self.trip()?;
            self.inner.set_if_absent(key, value).await
        }

        async fn health_check(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let flaky = Arc::new(FlakyStore::new(2));
        let store = RetryingStore::new(flaky.clone(), fast_policy());

        store.set("invoice:1", "{}").await.unwrap();
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.get("invoice:1").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_unavailable() {
        let flaky = Arc::new(FlakyStore::new(u32::MAX));
        let store = RetryingStore::new(
            flaky,
            RetryPolicy {
                max_elapsed: Duration::from_millis(20),
                ..fast_policy()
            },
        );

        let err = store.get("invoice:1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_no_retry_policy_fails_fast() {
        let flaky = Arc::new(FlakyStore::new(1));
        let store = RetryingStore::new(flaky.clone(), RetryPolicy::no_retry());

        assert!(store.get("k").await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
