

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::store::{DataStore, Predicate, Row, StoreError};
use crate::core::config::PurgeConfig;


const MAX_RETRIES: u32 = 3;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10000;


#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PurgeConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay: Duration::from_millis(config.initial_retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}


pub struct StoreClient {

    inner: Arc<dyn DataStore>,

    policy: RetryPolicy,
}

impl StoreClient {

    pub fn new(inner: Arc<dyn DataStore>) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }


    pub fn with_policy(inner: Arc<dyn DataStore>, policy: RetryPolicy) -> Self {
        debug!(
            "StoreClient created: max_attempts={}, initial_delay={:?}",
            policy.max_attempts, policy.initial_delay
        );
        Self { inner, policy }
    }


    pub fn inner(&self) -> &Arc<dyn DataStore> {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, table: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let mut last_error = None;
        let mut delay = self.policy.initial_delay;

        for attempt in 1..=self.policy.max_attempts {
            debug!("Executing {} on {} (attempt {})", label, table, attempt);

            match call().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_transient() => {
                    debug!("{} on {} rejected, not retrying: {}", label, table, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "{} on {} failed (attempt {}/{}): {}",
                        label, table, attempt, self.policy.max_attempts, e
                    );
                    last_error = Some(e.to_string());

                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(self.policy.max_delay);
                    }
                }
            }
        }

        Err(StoreError::RetryExhausted(
            self.policy.max_attempts,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

#[async_trait]
impl DataStore for StoreClient {
    async fn select_where(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>, StoreError> {
        self.with_retry("select", table, || self.inner.select_where(table, predicate))
            .await
    }

    async fn count(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        self.with_retry("count", table, || self.inner.count(table, predicate))
            .await
    }

    // Deleting by predicate twice removes nothing the second time, so retrying is safe.
    async fn delete_where(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        self.with_retry("delete", table, || self.inner.delete_where(table, predicate))
            .await
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<usize, StoreError> {
        self.inner.insert_rows(table, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::store::StoreOp;
    use serde_json::json;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = Arc::new(InMemoryStore::new());
        store.insert("parts", json!({"id": "P1"})).await;
        store.fail_transiently("parts", StoreOp::Count, 2);

        let client = StoreClient::with_policy(store.clone(), fast_policy());
        let count = client.count("parts", &Predicate::eq("id", "P1")).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_transiently("parts", StoreOp::Select, 10);

        let client = StoreClient::with_policy(store, fast_policy());
        let err = client
            .select_where("parts", &Predicate::eq("id", "P1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RetryExhausted(3, _)));
    }

    #[tokio::test]
    async fn test_query_error_not_retried() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_on("parts", StoreOp::Delete);

        let client = StoreClient::with_policy(store, fast_policy());
        let err = client
            .delete_where("parts", &Predicate::eq("id", "P1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query { .. }));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = PurgeConfig::default();
        config.max_retries = 0;
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 1);
    }
}
