//! Persistent node store.
//!
//! This module provides:
//! - The [`NodeStore`] client contract with kind-tagged errors
//! - The retrying [`StoreGateway`] every component goes through
//! - An in-memory backend (development, tests, fault injection)
//! - A Postgres backend built on SQLx

mod gateway;
mod memory;
mod postgres;

pub use gateway::{RetryPolicy, StoreGateway};
pub use memory::InMemoryNodeStore;
pub use postgres::{DbConfig, DbError, PgNodeStore};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{NodeIdentity, NodeRecord};

/// Store failures. The kind is attached by the store client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The node does not exist. Never retried.
    #[error("node not found: {0}")]
    NotFound(String),

    /// Connectivity or contention problem; the call may succeed if repeated.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The store rejected the call; repeating it will not help.
    #[error("store failure: {0}")]
    Permanent(String),

    /// Every attempt failed with a transient error.
    #[error("store unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Wire client of the persistent store.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Upsert a record together with its identity.
    async fn save(&self, identity: &NodeIdentity, record: &NodeRecord) -> Result<(), StoreError>;

    async fn get(&self, name: &str) -> Result<NodeRecord, StoreError>;

    /// Identities of every stored node, ordered by name.
    async fn list(&self) -> Result<Vec<NodeIdentity>, StoreError>;

    async fn remove(&self, name: &str) -> Result<(), StoreError>;

    /// Cheap reachability probe used by readiness checks.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
