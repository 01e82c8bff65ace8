//! Lost connections: single nodes reported by a terminator, and every node of
//! a terminator whose keep-alives lapsed.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::Components;
use crate::error::ManagerError;
use crate::model::ConnectionStatus;
use crate::state_machine::ConnectionEvent;

#[derive(Clone)]
pub struct ConnectionLossHandler {
    components: Arc<Components>,
}

impl ConnectionLossHandler {
    pub fn new(components: Arc<Components>) -> Self {
        Self { components }
    }

    /// Handle `RIC_SCTP_CONNECTION_FAILURE` for a node.
    #[instrument(skip(self), fields(node = %name))]
    pub async fn on_connection_lost(&self, name: &str) -> Result<ConnectionStatus, ManagerError> {
        self.mark_lost(name, true).await
    }

    /// Deregister an expired terminator and run every node it carried through
    /// the lost-connection flow. Returns the number of nodes affected.
    #[instrument(skip(self), fields(terminator = %address))]
    pub async fn on_terminator_lost(&self, address: &str) -> Result<usize, ManagerError> {
        let orphaned = self.components.terminators.remove_instance(address).await?;

        for name in &orphaned {
            if let Err(e) = self.mark_lost(name, false).await {
                warn!(node = %name, error = %e, "Failed to disconnect orphaned node");
            }
        }
        info!(orphaned = orphaned.len(), "Terminator deregistered");
        Ok(orphaned.len())
    }

    async fn mark_lost(&self, name: &str, notify_routing: bool) -> Result<ConnectionStatus, ManagerError> {
        let c = &self.components;
        let _guard = c.locks.lock(name).await;

        let Some(mut record) = c.find(name).await? else {
            warn!("Connection loss reported for unknown node");
            return Err(ManagerError::NotFound(format!("node {name}")));
        };

        let before = record.status();
        if !record.apply(ConnectionEvent::ConnectionLost) {
            return Ok(before);
        }
        if before == ConnectionStatus::Disconnected {
            info!("Node already disconnected");
            return Ok(before);
        }

        if let Some(address) = record.associated_terminator.take() {
            if notify_routing {
                if let Err(e) = c.terminators.dissociate_node(name, &address).await {
                    warn!(terminator = %address, error = %e, "Failed to dissociate node");
                }
            }
        }
        c.sessions.cancel(name);
        c.persist_status(&record).await?;

        info!(from = %before, to = %record.status(), "Node connection lost");
        Ok(record.status())
    }
}
