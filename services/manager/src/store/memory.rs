//! In-memory node store.
//!
//! Used when no database is configured and throughout the test suites.
//! Failures can be queued with [`InMemoryNodeStore::fail_next`]; each call
//! consumes one queued failure before touching the data.
//! [`InMemoryNodeStore::fail_save_of`] targets the next save of one node.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{NodeStore, StoreError};
use crate::model::{NodeIdentity, NodeRecord};

#[derive(Default)]
pub struct InMemoryNodeStore {
    records: RwLock<BTreeMap<String, (NodeIdentity, NodeRecord)>>,
    faults: Mutex<VecDeque<StoreError>>,
    save_faults: Mutex<HashMap<String, StoreError>>,
    calls: AtomicUsize,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next call.
    pub fn fail_next(&self, error: StoreError) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Fail the next save of `name`.
    pub fn fail_save_of(&self, name: &str, error: StoreError) {
        self.save_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), error);
    }

    /// Number of store calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_call_count(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn save(&self, identity: &NodeIdentity, record: &NodeRecord) -> Result<(), StoreError> {
        self.enter()?;
        if let Some(error) = self
            .save_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&record.name)
        {
            return Err(error);
        }
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), (identity.clone(), record.clone()));
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<NodeRecord, StoreError> {
        self.enter()?;
        let records = self.records.read().await;
        records
            .get(name)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<NodeIdentity>, StoreError> {
        self.enter()?;
        let records = self.records.read().await;
        Ok(records.values().map(|(identity, _)| identity.clone()).collect())
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.enter()?;
        let mut records = self.records.write().await;
        records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2m_protocol::SetupProtocol;

    fn record(name: &str) -> NodeRecord {
        NodeRecord::new(name, "10.0.2.15", 8080, SetupProtocol::X2)
    }

    #[tokio::test]
    async fn test_save_get_list_remove() {
        let store = InMemoryNodeStore::new();
        for name in ["ran2", "ran1"] {
            let r = record(name);
            store.save(&r.identity(), &r).await.unwrap();
        }

        assert_eq!(store.get("ran1").await.unwrap().name, "ran1");

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["ran1", "ran2"]);

        store.remove("ran1").await.unwrap();
        assert_eq!(
            store.get("ran1").await.unwrap_err(),
            StoreError::NotFound("ran1".to_string())
        );
        assert!(store.remove("ran1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_queued_failures_are_consumed_in_order() {
        let store = InMemoryNodeStore::new();
        store.fail_next(StoreError::Transient("one".into()));
        store.fail_next(StoreError::Permanent("two".into()));

        assert_eq!(store.list().await.unwrap_err(), StoreError::Transient("one".into()));
        assert_eq!(store.list().await.unwrap_err(), StoreError::Permanent("two".into()));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.call_count(), 3);
    }
}
