//! Two-phase mass shutdown.
//!
//! Phase 1 moves every live node to SHUTTING_DOWN (DISCONNECTED nodes go
//! straight to SHUT_DOWN), drops all terminator associations and broadcasts
//! `RIC_SCTP_CLEAR_ALL`. After the shutdown timeout, phase 2 finalizes
//! whatever is still SHUTTING_DOWN. Per-node failures are logged and counted;
//! they never stop the batch. A started shutdown runs on its own task and
//! completes even if the caller goes away.

use std::sync::Arc;

use e2m_protocol::{Envelope, MessageType};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::Components;
use crate::error::ManagerError;
use crate::model::{ConnectionStatus, NodeIdentity};
use crate::state_machine::ConnectionEvent;

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    /// Nodes listed at the start.
    pub total: usize,
    /// Nodes moved to SHUTTING_DOWN in phase 1.
    pub shutting_down: usize,
    /// DISCONNECTED nodes moved straight to SHUT_DOWN in phase 1.
    pub shut_down_immediately: usize,
    /// Nodes already SHUTTING_DOWN or SHUT_DOWN in phase 1.
    pub skipped: usize,
    /// Nodes moved from SHUTTING_DOWN to SHUT_DOWN in phase 2.
    pub finalized: usize,
    /// Per-node failures across both phases.
    pub failed: usize,
}

impl ShutdownReport {
    fn changed(&self) -> usize {
        self.shutting_down + self.shut_down_immediately
    }
}

enum PhaseOne {
    ShuttingDown,
    ShutDown,
    Skipped,
}

#[derive(Clone)]
pub struct ShutdownOrchestrator {
    components: Arc<Components>,
}

impl ShutdownOrchestrator {
    pub fn new(components: Arc<Components>) -> Self {
        Self { components }
    }

    pub async fn shutdown(&self) -> Result<ShutdownReport, ManagerError> {
        let this = self.clone();
        Ok(tokio::spawn(async move { this.run().await }).await?)
    }

    #[instrument(skip(self))]
    async fn run(&self) -> ShutdownReport {
        let c = &self.components;
        let nodes = c.registry.list_all().await;

        let mut report = ShutdownReport {
            total: nodes.len(),
            ..Default::default()
        };
        if nodes.is_empty() {
            info!("No nodes to shut down");
            return report;
        }

        for node in &nodes {
            match self.phase_one(node).await {
                Ok(PhaseOne::ShuttingDown) => report.shutting_down += 1,
                Ok(PhaseOne::ShutDown) => report.shut_down_immediately += 1,
                Ok(PhaseOne::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(node = %node.name, error = %e, "Shutdown phase 1 failed for node");
                    report.failed += 1;
                }
            }
        }

        if report.changed() > 0 {
            if let Err(e) = c.terminators.clear_all_associations().await {
                warn!(error = %e, "Failed to clear terminator associations");
            }
            if let Err(e) = c
                .transport
                .send(Envelope::new(MessageType::SctpClearAll, "", Vec::new()))
                .await
            {
                warn!(error = %e, "Failed to broadcast clear-all");
            }

            info!(
                changed = report.changed(),
                timeout_secs = c.settings.shutdown_timeout.as_secs(),
                "Waiting for nodes to disconnect"
            );
            tokio::time::sleep(c.settings.shutdown_timeout).await;
        }

        for node in &nodes {
            match self.phase_two(node).await {
                Ok(true) => report.finalized += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(node = %node.name, error = %e, "Shutdown phase 2 failed for node");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            shutting_down = report.shutting_down,
            shut_down_immediately = report.shut_down_immediately,
            skipped = report.skipped,
            finalized = report.finalized,
            failed = report.failed,
            "Shutdown complete"
        );
        report
    }

    async fn phase_one(&self, node: &NodeIdentity) -> Result<PhaseOne, ManagerError> {
        let c = &self.components;
        let _guard = c.locks.lock(&node.name).await;
        let mut record = c.store.get(&node.name).await?;

        if matches!(
            record.status(),
            ConnectionStatus::ShuttingDown | ConnectionStatus::ShutDown
        ) {
            return Ok(PhaseOne::Skipped);
        }
        if !record.apply(ConnectionEvent::ShutdownRequested) {
            return Ok(PhaseOne::Skipped);
        }

        record.associated_terminator = None;
        c.sessions.cancel(&node.name);
        c.persist_status(&record).await?;

        Ok(match record.status() {
            ConnectionStatus::ShutDown => PhaseOne::ShutDown,
            _ => PhaseOne::ShuttingDown,
        })
    }

    async fn phase_two(&self, node: &NodeIdentity) -> Result<bool, ManagerError> {
        let c = &self.components;
        let _guard = c.locks.lock(&node.name).await;
        let mut record = c.store.get(&node.name).await?;

        if record.status() != ConnectionStatus::ShuttingDown {
            return Ok(false);
        }
        record.apply(ConnectionEvent::ShutdownTimeoutElapsed);
        c.persist_status(&record).await?;
        Ok(true)
    }
}
