//! The manager: one handle over every flow.
//!
//! Cheap to clone; all clones share the same components.

use std::sync::Arc;

use chrono::Utc;
use e2m_protocol::{Envelope, MessageType, PduCodec, TerminatorAnnouncement};
use tracing::{debug, info, warn};

use crate::config::ManagerSettings;
use crate::error::ManagerError;
use crate::model::{NodeIdentity, NodeRecord};
use crate::orchestrator::{
    Components, ConnectionLossHandler, RemovalOrchestrator, ResetOrchestrator, ResetOutcome,
    SetupOrchestrator, SetupRequest, ShutdownOrchestrator, ShutdownReport,
};
use crate::routing::RoutingClient;
use crate::sessions::RequestKind;
use crate::store::NodeStore;
use crate::terminators::TerminatorInstance;
use crate::transport::{MessageTransport, TransportError};

#[derive(Clone)]
pub struct Manager {
    components: Arc<Components>,
    setup: SetupOrchestrator,
    reset: ResetOrchestrator,
    shutdown: ShutdownOrchestrator,
    removal: RemovalOrchestrator,
    connection_loss: ConnectionLossHandler,
}

impl Manager {
    pub fn new(
        store: Arc<dyn NodeStore>,
        routing: Arc<dyn RoutingClient>,
        transport: Arc<dyn MessageTransport>,
        codec: Arc<dyn PduCodec>,
        settings: ManagerSettings,
    ) -> Self {
        let components = Arc::new(Components::new(store, routing, transport, codec, settings));
        Self {
            setup: SetupOrchestrator::new(components.clone()),
            reset: ResetOrchestrator::new(components.clone()),
            shutdown: ShutdownOrchestrator::new(components.clone()),
            removal: RemovalOrchestrator::new(components.clone()),
            connection_loss: ConnectionLossHandler::new(components.clone()),
            components,
        }
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.components.settings
    }

    /// Seed the registry from the store and re-register every persisted
    /// terminator association. Returns the number of nodes loaded.
    pub async fn bootstrap(&self) -> Result<usize, ManagerError> {
        let c = &self.components;
        let identities = c.store.list().await?;
        let names: Vec<String> = identities.iter().map(|i| i.name.clone()).collect();
        let loaded = c.registry.seed(identities).await;

        let mut restored = 0;
        for name in &names {
            match c.store.get(name).await {
                Ok(record) => {
                    if let Some(address) = &record.associated_terminator {
                        c.terminators.restore_association(name, address).await;
                        restored += 1;
                    }
                }
                Err(e) => warn!(node = %name, error = %e, "Failed to load node association"),
            }
        }

        info!(nodes = loaded, associations = restored, "Node registry loaded");
        Ok(loaded)
    }

    pub async fn setup_node(&self, request: SetupRequest) -> Result<NodeRecord, ManagerError> {
        self.setup.setup(request).await
    }

    pub async fn reset_node(&self, name: &str, cause: Option<&str>) -> Result<ResetOutcome, ManagerError> {
        self.reset.reset(name, cause).await
    }

    pub async fn shutdown_all(&self) -> Result<ShutdownReport, ManagerError> {
        self.shutdown.shutdown().await
    }

    pub async fn remove_node(&self, name: &str) -> Result<(), ManagerError> {
        self.removal.remove(name).await
    }

    pub async fn get_node(&self, name: &str) -> Result<NodeRecord, ManagerError> {
        Ok(self.components.store.get(name).await?)
    }

    pub async fn list_nodes(&self) -> Vec<NodeIdentity> {
        self.components.registry.list_all().await
    }

    pub async fn list_terminators(&self) -> Vec<TerminatorInstance> {
        self.components.terminators.list().await
    }

    /// Route one inbound envelope to its flow.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<(), ManagerError> {
        debug!(
            message_type = %envelope.message_type,
            meid = %envelope.meid,
            "Inbound envelope"
        );

        match envelope.message_type {
            MessageType::X2SetupResponse
            | MessageType::X2SetupFailure
            | MessageType::EndcX2SetupResponse
            | MessageType::EndcX2SetupFailure => self.setup.on_reply(envelope).await,

            MessageType::SctpConnectionFailure => self
                .connection_loss
                .on_connection_lost(&envelope.meid)
                .await
                .map(|_| ()),

            MessageType::X2ResetResponse => {
                let key = envelope.correlation_key().to_string();
                match self
                    .components
                    .sessions
                    .resolve(&key, RequestKind::is_reset, envelope)
                {
                    Some(resolved) => info!(
                        node = %key,
                        elapsed_ms = resolved.elapsed.as_millis() as u64,
                        "Reset response correlated"
                    ),
                    None => warn!(node = %key, "Reset response without a pending reset, ignoring"),
                }
                Ok(())
            }

            MessageType::TerminatorInit => {
                let announcement =
                    TerminatorAnnouncement::decode(envelope.message_type, &envelope.payload)
                        .map_err(|e| ManagerError::Validation(e.to_string()))?;
                self.components
                    .terminators
                    .add_instance(&announcement.address, Utc::now())
                    .await?;
                Ok(())
            }

            MessageType::TerminatorKeepAliveResponse => {
                let announcement =
                    TerminatorAnnouncement::decode(envelope.message_type, &envelope.payload)
                        .map_err(|e| ManagerError::Validation(e.to_string()))?;
                if !self
                    .components
                    .terminators
                    .record_keep_alive(&announcement.address, Utc::now())
                    .await
                {
                    warn!(terminator = %announcement.address, "Keep-alive from unknown terminator");
                }
                Ok(())
            }

            other => {
                warn!(message_type = %other, "Unexpected inbound message type, dropping");
                Ok(())
            }
        }
    }

    /// Drop setup sessions nobody answered within the session TTL.
    pub fn sweep_sessions(&self) -> usize {
        let expired = self
            .components
            .sessions
            .expire(self.components.settings.session_ttl);
        for session in &expired {
            warn!(
                node = %session.transaction_id,
                kind = session.kind.name(),
                age_ms = session.age.as_millis() as u64,
                "Session expired without a response"
            );
        }
        expired.len()
    }

    /// One keep-alive round: ask every terminator for a keep-alive, then
    /// deregister the ones that stopped answering.
    pub async fn supervise_terminators(&self) -> usize {
        let c = &self.components;
        let request = Envelope::new(MessageType::TerminatorKeepAliveRequest, "", Vec::new());
        match c.transport.send(request).await {
            Ok(()) => {}
            Err(TransportError::NoPeers) => debug!("No terminator connected for keep-alive"),
            Err(e) => warn!(error = %e, "Failed to send keep-alive request"),
        }

        c.terminators
            .expire_stale(Utc::now(), c.settings.keep_alive_expiration)
            .await;

        let mut affected = 0;
        for address in c.terminators.to_be_deleted().await {
            match self.connection_loss.on_terminator_lost(&address).await {
                Ok(nodes) => affected += nodes,
                Err(e) => warn!(terminator = %address, error = %e, "Failed to deregister terminator"),
            }
        }
        affected
    }
}
