//! Node removal.

use std::sync::Arc;

use tracing::{info, instrument};

use super::Components;
use crate::error::ManagerError;
use crate::model::ConnectionStatus;

#[derive(Clone)]
pub struct RemovalOrchestrator {
    components: Arc<Components>,
}

impl RemovalOrchestrator {
    pub fn new(components: Arc<Components>) -> Self {
        Self { components }
    }

    /// Forget a node that is not carrying traffic.
    #[instrument(skip(self), fields(node = %name))]
    pub async fn remove(&self, name: &str) -> Result<(), ManagerError> {
        let c = &self.components;
        let _guard = c.locks.lock(name).await;
        let record = c.store.get(name).await?;

        match record.status() {
            ConnectionStatus::Disconnected
            | ConnectionStatus::ShutDown
            | ConnectionStatus::ConnectedSetupFailed => {}
            status => return Err(ManagerError::wrong_state(name, status, "remove")),
        }

        if let Some(address) = &record.associated_terminator {
            c.terminators.dissociate_node(name, address).await?;
        }
        c.sessions.cancel(name);
        c.store.remove(name).await?;
        c.registry.remove(name).await;

        info!("Node removed");
        Ok(())
    }
}
