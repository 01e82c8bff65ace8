//! Node life-cycle orchestration.
//!
//! Each orchestrator owns one flow (setup, reset, shutdown, connection loss,
//! removal) and shares the process-wide [`Components`]. Flows touching a node
//! hold that node's lock from fetch to persist.

mod disconnect;
mod removal;
mod reset;
mod setup;
mod shutdown;

pub use disconnect::ConnectionLossHandler;
pub use removal::RemovalOrchestrator;
pub use reset::{ResetOrchestrator, ResetOutcome};
pub use setup::{SetupOrchestrator, SetupRequest};
pub use shutdown::{ShutdownOrchestrator, ShutdownReport};

use std::sync::Arc;

use e2m_protocol::PduCodec;

use crate::config::ManagerSettings;
use crate::error::ManagerError;
use crate::locks::NodeLocks;
use crate::model::NodeRecord;
use crate::registry::NodeRegistry;
use crate::routing::RoutingClient;
use crate::sessions::SessionTable;
use crate::store::{NodeStore, StoreGateway};
use crate::terminators::TerminatorManager;
use crate::transport::MessageTransport;

/// Everything the orchestrators work with.
pub struct Components {
    pub store: StoreGateway,
    pub registry: NodeRegistry,
    pub terminators: TerminatorManager,
    pub sessions: SessionTable,
    pub transport: Arc<dyn MessageTransport>,
    pub codec: Arc<dyn PduCodec>,
    pub locks: NodeLocks,
    pub settings: ManagerSettings,
}

impl Components {
    pub fn new(
        store: Arc<dyn NodeStore>,
        routing: Arc<dyn RoutingClient>,
        transport: Arc<dyn MessageTransport>,
        codec: Arc<dyn PduCodec>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            store: StoreGateway::new(store, settings.store_retry),
            registry: NodeRegistry::new(),
            terminators: TerminatorManager::new(routing),
            sessions: SessionTable::new(),
            transport,
            codec,
            locks: NodeLocks::new(),
            settings,
        }
    }

    /// Save a record, then mirror its identity into the registry.
    pub async fn persist(&self, record: &NodeRecord) -> Result<(), ManagerError> {
        self.store.save(record).await?;
        self.registry.add(record.identity()).await;
        Ok(())
    }

    /// Save a record whose identity changed only in its connection status.
    pub async fn persist_status(&self, record: &NodeRecord) -> Result<(), ManagerError> {
        self.store.save(record).await?;
        if self
            .registry
            .update_connection_status(&record.name, record.status())
            .await
            .is_err()
        {
            self.registry.add(record.identity()).await;
        }
        Ok(())
    }

    /// Fetch a record; a missing node is `None` rather than an error.
    pub async fn find(&self, name: &str) -> Result<Option<NodeRecord>, ManagerError> {
        match self.store.get(name).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
