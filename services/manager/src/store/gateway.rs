//! Retrying façade over a [`NodeStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{NodeStore, StoreError};
use crate::model::{NodeIdentity, NodeRecord};

/// Fixed-interval retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,

    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        }
    }
}

/// The only path to the store.
///
/// Transient errors are retried up to `max_attempts` total attempts; every
/// other error is returned after the first attempt.
#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn NodeStore>,
    policy: RetryPolicy,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn NodeStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Persist a record and the identity derived from it.
    pub async fn save(&self, record: &NodeRecord) -> Result<(), StoreError> {
        let identity = record.identity();
        let (store, identity) = (&self.store, &identity);
        self.with_retry("save", move || store.save(identity, record))
            .await
    }

    pub async fn get(&self, name: &str) -> Result<NodeRecord, StoreError> {
        let store = &self.store;
        self.with_retry("get", move || store.get(name)).await
    }

    pub async fn list(&self) -> Result<Vec<NodeIdentity>, StoreError> {
        let store = &self.store;
        self.with_retry("list", move || store.list()).await
    }

    pub async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let store = &self.store;
        self.with_retry("remove", move || store.remove(name)).await
    }

    /// Single probe, no retries.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, error = %e, "Store retries exhausted");
                        return Err(StoreError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    debug!(operation, attempt, error = %e, "Transient store failure, retrying");
                    tokio::time::sleep(self.policy.interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
