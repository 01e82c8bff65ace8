//! Terminator-instance manager.
//!
//! Tracks the pool of terminator processes and which nodes each one carries.
//! Every association change is announced to the routing manager before it is
//! recorded locally; a routing failure leaves the local view untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::routing::{RoutingClient, RoutingError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstanceError {
    /// The pool is empty.
    #[error("no terminator instance available")]
    NoInstanceAvailable,

    /// Instances exist but none is currently active.
    #[error("{count} terminator instances registered, none active")]
    InstancesUnavailable { count: usize },

    #[error("unknown terminator instance: {0}")]
    UnknownInstance(String),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Active,
    /// Keep-alives lapsed; waiting for deregistration.
    ToBeDeleted,
}

/// A terminator process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatorInstance {
    pub address: String,
    pub state: InstanceState,
    pub associated_nodes: BTreeSet<String>,
    pub last_keep_alive: DateTime<Utc>,
}

impl TerminatorInstance {
    fn new(address: &str, now: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            state: InstanceState::Active,
            associated_nodes: BTreeSet::new(),
            last_keep_alive: now,
        }
    }
}

pub struct TerminatorManager {
    instances: RwLock<BTreeMap<String, TerminatorInstance>>,
    /// Persisted associations for instances that have not announced yet.
    restored: RwLock<BTreeMap<String, BTreeSet<String>>>,
    routing: Arc<dyn RoutingClient>,
}

impl TerminatorManager {
    pub fn new(routing: Arc<dyn RoutingClient>) -> Self {
        Self {
            instances: RwLock::new(BTreeMap::new()),
            restored: RwLock::new(BTreeMap::new()),
            routing,
        }
    }

    /// Re-register an association loaded from the store. The routing manager
    /// is not told; it already holds the association. If the instance is not
    /// in the pool yet, the association is adopted when it announces.
    pub async fn restore_association(&self, node: &str, address: &str) {
        let mut instances = self.instances.write().await;
        match instances.get_mut(address) {
            Some(instance) => {
                instance.associated_nodes.insert(node.to_string());
            }
            None => {
                self.restored
                    .write()
                    .await
                    .entry(address.to_string())
                    .or_default()
                    .insert(node.to_string());
            }
        }
    }

    /// Pick the active instance carrying the fewest nodes. Ties go to the
    /// lowest address.
    pub async fn select_instance(&self) -> Result<String, InstanceError> {
        let instances = self.instances.read().await;
        if instances.is_empty() {
            return Err(InstanceError::NoInstanceAvailable);
        }

        instances
            .values()
            .filter(|i| i.state == InstanceState::Active)
            .min_by(|a, b| {
                a.associated_nodes
                    .len()
                    .cmp(&b.associated_nodes.len())
                    .then_with(|| a.address.cmp(&b.address))
            })
            .map(|i| i.address.clone())
            .ok_or(InstanceError::InstancesUnavailable {
                count: instances.len(),
            })
    }

    pub async fn associate_node(&self, node: &str, address: &str) -> Result<(), InstanceError> {
        if !self.instances.read().await.contains_key(address) {
            return Err(InstanceError::UnknownInstance(address.to_string()));
        }

        self.routing.associate_node(address, node).await?;

        let mut instances = self.instances.write().await;
        let instance = instances
            .get_mut(address)
            .ok_or_else(|| InstanceError::UnknownInstance(address.to_string()))?;
        instance.associated_nodes.insert(node.to_string());
        info!(node, terminator = address, "Node associated");
        Ok(())
    }

    /// Remove an association. An instance that is already gone is not an error.
    pub async fn dissociate_node(&self, node: &str, address: &str) -> Result<(), InstanceError> {
        self.routing.dissociate_node(address, node).await?;

        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(address) {
            instance.associated_nodes.remove(node);
        }
        info!(node, terminator = address, "Node dissociated");
        Ok(())
    }

    /// Register an instance announced by `E2_TERM_INIT`.
    ///
    /// A re-announced instance is reactivated and keeps its associations.
    /// Returns true when the instance is new.
    pub async fn add_instance(&self, address: &str, now: DateTime<Utc>) -> Result<bool, InstanceError> {
        {
            let mut instances = self.instances.write().await;
            if let Some(instance) = instances.get_mut(address) {
                instance.state = InstanceState::Active;
                instance.last_keep_alive = now;
                info!(terminator = address, "Terminator instance re-announced");
                return Ok(false);
            }
        }

        self.routing.add_instance(address).await?;

        let mut instances = self.instances.write().await;
        let instance = instances
            .entry(address.to_string())
            .or_insert_with(|| TerminatorInstance::new(address, now));
        if let Some(nodes) = self.restored.write().await.remove(address) {
            info!(terminator = address, nodes = nodes.len(), "Adopted persisted associations");
            instance.associated_nodes.extend(nodes);
        }
        info!(terminator = address, "Terminator instance added");
        Ok(true)
    }

    /// Deregister an instance. Returns the names of the nodes it carried.
    pub async fn remove_instance(&self, address: &str) -> Result<Vec<String>, InstanceError> {
        let orphaned: Vec<String> = {
            let instances = self.instances.read().await;
            let instance = instances
                .get(address)
                .ok_or_else(|| InstanceError::UnknownInstance(address.to_string()))?;
            instance.associated_nodes.iter().cloned().collect()
        };

        self.routing.remove_instance(address, &orphaned).await?;

        self.instances.write().await.remove(address);
        info!(terminator = address, orphaned = orphaned.len(), "Terminator instance removed");
        Ok(orphaned)
    }

    /// Record a keep-alive response. Returns false for unknown instances.
    pub async fn record_keep_alive(&self, address: &str, now: DateTime<Utc>) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(address) {
            Some(instance) => {
                instance.last_keep_alive = now;
                if instance.state == InstanceState::ToBeDeleted {
                    warn!(terminator = address, "Keep-alive from instance pending deletion");
                }
                true
            }
            None => false,
        }
    }

    /// Mark active instances whose last keep-alive is older than `expiration`.
    /// Returns the newly marked addresses.
    pub async fn expire_stale(&self, now: DateTime<Utc>, expiration: Duration) -> Vec<String> {
        let expiration =
            chrono::Duration::from_std(expiration).unwrap_or_else(|_| chrono::Duration::days(365));
        let mut instances = self.instances.write().await;
        let mut expired = Vec::new();
        for instance in instances.values_mut() {
            if instance.state == InstanceState::Active && now - instance.last_keep_alive > expiration {
                instance.state = InstanceState::ToBeDeleted;
                warn!(
                    terminator = %instance.address,
                    last_keep_alive = %instance.last_keep_alive,
                    "Terminator keep-alive expired"
                );
                expired.push(instance.address.clone());
            }
        }
        expired
    }

    /// Instances waiting for deregistration.
    pub async fn to_be_deleted(&self) -> Vec<String> {
        self.instances
            .read()
            .await
            .values()
            .filter(|i| i.state == InstanceState::ToBeDeleted)
            .map(|i| i.address.clone())
            .collect()
    }

    /// Drop every association, routing manager first.
    pub async fn clear_all_associations(&self) -> Result<(), InstanceError> {
        let addresses: Vec<String> = self.instances.read().await.keys().cloned().collect();
        if addresses.is_empty() {
            return Ok(());
        }

        self.routing.dissociate_all(&addresses).await?;

        let mut instances = self.instances.write().await;
        for instance in instances.values_mut() {
            instance.associated_nodes.clear();
        }
        info!(instances = addresses.len(), "Cleared all node associations");
        Ok(())
    }

    pub async fn get(&self, address: &str) -> Option<TerminatorInstance> {
        self.instances.read().await.get(address).cloned()
    }

    pub async fn list(&self) -> Vec<TerminatorInstance> {
        self.instances.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{MockRoutingClient, RoutingCall};

    fn manager() -> (TerminatorManager, Arc<MockRoutingClient>) {
        let routing = Arc::new(MockRoutingClient::new());
        (TerminatorManager::new(routing.clone()), routing)
    }

    #[tokio::test]
    async fn test_empty_pool_is_absence() {
        let (terminators, _) = manager();
        assert_eq!(
            terminators.select_instance().await,
            Err(InstanceError::NoInstanceAvailable)
        );
    }

    #[tokio::test]
    async fn test_select_prefers_least_loaded_then_lowest_address() {
        let (terminators, _) = manager();
        let now = Utc::now();
        for address in ["10.0.2.17:38000", "10.0.2.15:38000", "10.0.2.16:38000"] {
            terminators.add_instance(address, now).await.unwrap();
        }
        assert_eq!(terminators.select_instance().await.unwrap(), "10.0.2.15:38000");

        terminators.associate_node("ran1", "10.0.2.15:38000").await.unwrap();
        assert_eq!(terminators.select_instance().await.unwrap(), "10.0.2.16:38000");
    }

    #[tokio::test]
    async fn test_no_active_instance_is_transient() {
        let (terminators, _) = manager();
        let then = Utc::now() - chrono::Duration::seconds(60);
        terminators.add_instance("10.0.2.15:38000", then).await.unwrap();

        let expired = terminators
            .expire_stale(Utc::now(), Duration::from_secs(5))
            .await;
        assert_eq!(expired, vec!["10.0.2.15:38000".to_string()]);
        assert_eq!(
            terminators.select_instance().await,
            Err(InstanceError::InstancesUnavailable { count: 1 })
        );
        assert_eq!(terminators.to_be_deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_routing_failure_leaves_local_view_unchanged() {
        let (terminators, routing) = manager();
        terminators.add_instance("10.0.2.15:38000", Utc::now()).await.unwrap();

        routing.set_failing(true);
        let err = terminators
            .associate_node("ran1", "10.0.2.15:38000")
            .await
            .unwrap_err();
        assert!(matches!(err, InstanceError::Routing(_)));

        let instance = terminators.get("10.0.2.15:38000").await.unwrap();
        assert!(instance.associated_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_associate_unknown_instance() {
        let (terminators, routing) = manager();
        let err = terminators
            .associate_node("ran1", "10.9.9.9:38000")
            .await
            .unwrap_err();
        assert_eq!(err, InstanceError::UnknownInstance("10.9.9.9:38000".into()));
        assert!(routing.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_instance_returns_orphans() {
        let (terminators, routing) = manager();
        terminators.add_instance("10.0.2.15:38000", Utc::now()).await.unwrap();
        terminators.associate_node("ran1", "10.0.2.15:38000").await.unwrap();
        terminators.associate_node("ran2", "10.0.2.15:38000").await.unwrap();

        let orphaned = terminators.remove_instance("10.0.2.15:38000").await.unwrap();
        assert_eq!(orphaned, vec!["ran1".to_string(), "ran2".to_string()]);
        assert!(terminators.list().await.is_empty());
        assert_eq!(
            routing.calls().last(),
            Some(&RoutingCall::RemoveInstance(
                "10.0.2.15:38000".into(),
                vec!["ran1".into(), "ran2".into()]
            ))
        );
    }

    #[tokio::test]
    async fn test_re_announce_keeps_associations() {
        let (terminators, _) = manager();
        let now = Utc::now();
        assert!(terminators.add_instance("10.0.2.15:38000", now).await.unwrap());
        terminators.associate_node("ran1", "10.0.2.15:38000").await.unwrap();
        assert!(!terminators.add_instance("10.0.2.15:38000", now).await.unwrap());

        let instance = terminators.get("10.0.2.15:38000").await.unwrap();
        assert!(instance.associated_nodes.contains("ran1"));
    }

    #[tokio::test]
    async fn test_restored_associations_are_adopted_on_announce() {
        let (terminators, routing) = manager();
        terminators.restore_association("ran1", "10.0.2.15:38000").await;
        terminators.restore_association("ran2", "10.0.2.16:38000").await;
        assert!(terminators.list().await.is_empty());

        let now = Utc::now();
        terminators.add_instance("10.0.2.15:38000", now).await.unwrap();
        terminators.add_instance("10.0.2.16:38000", now).await.unwrap();
        terminators.restore_association("ran3", "10.0.2.16:38000").await;

        let first = terminators.get("10.0.2.15:38000").await.unwrap();
        assert_eq!(first.associated_nodes.len(), 1);
        let second = terminators.get("10.0.2.16:38000").await.unwrap();
        assert_eq!(second.associated_nodes.len(), 2);

        // Existing load counts toward selection.
        assert_eq!(terminators.select_instance().await.unwrap(), "10.0.2.15:38000");
        assert!(!routing
            .calls()
            .iter()
            .any(|c| matches!(c, RoutingCall::Associate(..))));
    }

    #[tokio::test]
    async fn test_clear_all_associations() {
        let (terminators, routing) = manager();
        let now = Utc::now();
        terminators.add_instance("10.0.2.15:38000", now).await.unwrap();
        terminators.add_instance("10.0.2.16:38000", now).await.unwrap();
        terminators.associate_node("ran1", "10.0.2.15:38000").await.unwrap();
        terminators.associate_node("ran2", "10.0.2.16:38000").await.unwrap();

        terminators.clear_all_associations().await.unwrap();
        assert!(terminators
            .list()
            .await
            .iter()
            .all(|i| i.associated_nodes.is_empty()));
        assert!(matches!(
            routing.calls().last(),
            Some(RoutingCall::DissociateAll(addresses)) if addresses.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_keep_alive_refreshes_instance() {
        let (terminators, _) = manager();
        let then = Utc::now() - chrono::Duration::seconds(60);
        terminators.add_instance("10.0.2.15:38000", then).await.unwrap();

        let now = Utc::now();
        assert!(terminators.record_keep_alive("10.0.2.15:38000", now).await);
        assert!(!terminators.record_keep_alive("10.9.9.9:38000", now).await);
        assert!(terminators
            .expire_stale(now, Duration::from_secs(5))
            .await
            .is_empty());
    }
}
