//! X2 reset.

use std::sync::Arc;

use e2m_protocol::{Envelope, MessageType, ResetCause};
use serde::Serialize;
use tracing::{info, instrument, warn, Instrument};

use super::Components;
use crate::error::ManagerError;
use crate::model::ConnectionStatus;
use crate::sessions::{PendingRequest, RequestKind};
use crate::state_machine::{transition, ConnectionEvent};

/// What happened to a reset once the settling interval passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub node: String,
    pub cause: String,
    /// Whether the node answered within the settling interval.
    pub confirmed: bool,
}

#[derive(Clone)]
pub struct ResetOrchestrator {
    components: Arc<Components>,
}

impl ResetOrchestrator {
    pub fn new(components: Arc<Components>) -> Self {
        Self { components }
    }

    /// Send an X2 reset to a connected node and reconcile after the settling
    /// interval. `cause` defaults to `misc:om-intervention`.
    #[instrument(skip(self), fields(node = %name))]
    pub async fn reset(&self, name: &str, cause: Option<&str>) -> Result<ResetOutcome, ManagerError> {
        let c = &self.components;

        let cause = match cause.map(str::trim) {
            None | Some("") => ResetCause::default_cause(),
            Some(cause) => {
                ResetCause::parse(cause).map_err(|e| ManagerError::Validation(e.to_string()))?
            }
        };

        let pending = {
            let _guard = c.locks.lock(name).await;
            let record = c.store.get(name).await?;

            let status = record.status();
            if status != ConnectionStatus::Connected
                || !transition(status, ConnectionEvent::ResetRequested).accepted
            {
                return Err(ManagerError::wrong_state(name, status, "reset"));
            }

            let payload = c.codec.pack_reset_request(&cause)?;
            let pending = c.sessions.register(name, RequestKind::Reset(cause))?;

            let envelope =
                Envelope::new(MessageType::X2Reset, name, payload).with_transaction_id(name);
            if let Err(e) = c.transport.send(envelope).await {
                c.sessions.cancel(name);
                warn!(error = %e, "Failed to dispatch reset request");
                return Err(e.into());
            }
            info!(%cause, "Reset request dispatched");
            pending
        };

        // Settling runs detached so the session is always released.
        let settle = tokio::spawn(
            settle(self.components.clone(), name.to_string(), pending).in_current_span(),
        );
        let confirmed = settle.await??;

        Ok(ResetOutcome {
            node: name.to_string(),
            cause: cause.name().to_string(),
            confirmed,
        })
    }
}

/// Wait out the settling interval, then reconcile. Returns whether the node
/// answered.
async fn settle(
    c: Arc<Components>,
    name: String,
    mut pending: PendingRequest,
) -> Result<bool, ManagerError> {
    tokio::time::sleep(c.settings.reset_settle).await;

    if pending.try_take().is_none() {
        c.sessions.cancel(pending.transaction_id());
        warn!(
            node = %name,
            settle_ms = c.settings.reset_settle.as_millis() as u64,
            "No reset response within settling interval"
        );
        return Ok(false);
    }

    let _guard = c.locks.lock(&name).await;
    let in_registry = matches!(
        c.registry.get(&name).await,
        Ok(identity) if identity.connection_status == ConnectionStatus::Connected
    );
    if !in_registry {
        if let Some(record) = c.find(&name).await? {
            if record.status() == ConnectionStatus::Connected {
                c.registry.add(record.identity()).await;
            }
        }
    }
    info!(node = %name, "Reset confirmed");
    Ok(true)
}
