//! In-memory node registry.
//!
//! Holds one [`NodeIdentity`] per node, bucketed by node type. Seeded from the
//! store at startup and kept current by every persisted mutation. The registry
//! never calls the store itself.

use std::collections::{BTreeMap, HashMap};

use e2m_protocol::NodeType;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::{ConnectionStatus, NodeIdentity};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node not registered: {0}")]
    NotFound(String),
}

#[derive(Default)]
pub struct NodeRegistry {
    buckets: RwLock<HashMap<NodeType, BTreeMap<String, NodeIdentity>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents.
    pub async fn seed(&self, identities: impl IntoIterator<Item = NodeIdentity>) -> usize {
        let mut buckets = self.buckets.write().await;
        buckets.clear();
        let mut count = 0;
        for identity in identities {
            buckets
                .entry(identity.node_type)
                .or_default()
                .insert(identity.name.clone(), identity);
            count += 1;
        }
        count
    }

    /// Insert or replace an identity. A changed node type moves it to the
    /// matching bucket.
    pub async fn add(&self, identity: NodeIdentity) {
        let mut buckets = self.buckets.write().await;
        for (node_type, bucket) in buckets.iter_mut() {
            if *node_type != identity.node_type {
                bucket.remove(&identity.name);
            }
        }
        buckets
            .entry(identity.node_type)
            .or_default()
            .insert(identity.name.clone(), identity);
    }

    pub async fn remove(&self, name: &str) -> Option<NodeIdentity> {
        let mut buckets = self.buckets.write().await;
        buckets.values_mut().find_map(|bucket| bucket.remove(name))
    }

    pub async fn update_connection_status(
        &self,
        name: &str,
        status: ConnectionStatus,
    ) -> Result<(), RegistryError> {
        let mut buckets = self.buckets.write().await;
        let identity = buckets
            .values_mut()
            .find_map(|bucket| bucket.get_mut(name))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        identity.connection_status = status;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<NodeIdentity, RegistryError> {
        let buckets = self.buckets.read().await;
        buckets
            .values()
            .find_map(|bucket| bucket.get(name))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All identities ordered by node type, then name.
    pub async fn list_all(&self) -> Vec<NodeIdentity> {
        let buckets = self.buckets.read().await;
        let mut types: Vec<_> = buckets.keys().copied().collect();
        types.sort();
        types
            .into_iter()
            .flat_map(|t| buckets[&t].values().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
