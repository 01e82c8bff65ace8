//! X2 / EN-DC X2 setup.
//!
//! The outbound half runs on the caller's request: pick a terminator, record
//! the node as CONNECTING and dispatch the setup request. The inbound half
//! runs when the terminator delivers the node's answer.

use std::net::IpAddr;
use std::sync::Arc;

use e2m_protocol::{Envelope, SetupOutcome, SetupParameters, SetupProtocol};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::Components;
use crate::error::ManagerError;
use crate::model::{ConnectionStatus, NodeRecord};
use crate::sessions::RequestKind;
use crate::state_machine::ConnectionEvent;
use crate::terminators::InstanceError;

/// Parameters of a setup request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    #[serde(rename = "ranName")]
    pub name: String,
    #[serde(rename = "ranIp")]
    pub ip: String,
    #[serde(rename = "ranPort")]
    pub port: u16,
    #[serde(skip)]
    pub protocol: SetupProtocol,
}

impl SetupRequest {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16, protocol: SetupProtocol) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
            protocol,
        }
    }

    pub fn validate(&self) -> Result<(), ManagerError> {
        if self.name.trim().is_empty() {
            return Err(ManagerError::Validation("ranName must not be empty".into()));
        }
        if self.ip.parse::<IpAddr>().is_err() {
            return Err(ManagerError::Validation(format!(
                "ranIp is not an IP address: {:?}",
                self.ip
            )));
        }
        if self.port == 0 {
            return Err(ManagerError::Validation("ranPort must not be 0".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SetupOrchestrator {
    components: Arc<Components>,
}

impl SetupOrchestrator {
    pub fn new(components: Arc<Components>) -> Self {
        Self { components }
    }

    /// Start a setup. Returns the record as persisted once the request is on
    /// the wire; the outcome arrives later through [`Self::on_reply`].
    #[instrument(skip(self, request), fields(node = %request.name, protocol = ?request.protocol))]
    pub async fn setup(&self, request: SetupRequest) -> Result<NodeRecord, ManagerError> {
        request.validate()?;
        let c = &self.components;
        let name = request.name.as_str();

        let payload = c.codec.pack_setup_request(&SetupParameters {
            protocol: request.protocol,
            ric_plmn_id: c.settings.ric_plmn_id.clone(),
            ric_near_rt_id: c.settings.ric_near_rt_id.clone(),
        })?;

        let _guard = c.locks.lock(name).await;

        let existing = c.find(name).await?;
        if let Some(record) = &existing {
            if matches!(
                record.status(),
                ConnectionStatus::ShuttingDown | ConnectionStatus::ShutDown
            ) {
                return Err(ManagerError::wrong_state(name, record.status(), "set up"));
            }
        }
        if c.sessions.contains(name) {
            return Err(ManagerError::RequestInFlight(name.to_string()));
        }

        let mut record = existing.unwrap_or_else(|| {
            NodeRecord::new(name, request.ip.clone(), request.port, request.protocol)
        });
        record.ip = request.ip.clone();
        record.port = request.port;
        record.setup_protocol = request.protocol;

        // An address the pool no longer knows (e.g. carried over from before
        // a restart) is replaced by a fresh selection.
        let mut known = record.associated_terminator.clone();
        if let Some(address) = &known {
            if c.terminators.get(address).await.is_none() {
                warn!(terminator = %address, "Stored terminator is not in the pool, reselecting");
                known = None;
                record.associated_terminator = None;
            }
        }

        let mut newly_associated = false;
        let address = match known {
            Some(address) => address,
            None => match c.terminators.select_instance().await {
                Ok(address) => {
                    c.terminators.associate_node(name, &address).await?;
                    record.associated_terminator = Some(address.clone());
                    newly_associated = true;
                    address
                }
                Err(InstanceError::NoInstanceAvailable) => {
                    if record.status() != ConnectionStatus::Disconnected {
                        record.apply(ConnectionEvent::ConnectionLost);
                    }
                    c.persist(&record).await?;
                    warn!("No terminator instance available, node left disconnected");
                    return Err(ManagerError::InstancePoolAbsence);
                }
                Err(e) => return Err(e.into()),
            },
        };

        let connecting = record.status() != ConnectionStatus::Connected;
        if connecting && !record.apply(ConnectionEvent::SetupInitiated) {
            return Err(ManagerError::wrong_state(name, record.status(), "set up"));
        }
        record.connection_attempts += 1;

        if let Err(e) = c.persist(&record).await {
            if newly_associated {
                if let Err(de) = c.terminators.dissociate_node(name, &address).await {
                    warn!(error = %de, terminator = %address, "Failed to undo association");
                }
            }
            return Err(e);
        }

        c.sessions
            .register(name, RequestKind::Setup(request.protocol))?;

        let envelope =
            Envelope::new(request.protocol.request_type(), name, payload).with_transaction_id(name);
        if let Err(e) = c.transport.send(envelope).await {
            c.sessions.cancel(name);
            if connecting {
                record.apply(ConnectionEvent::ConnectionLost);
                if let Err(pe) = c.persist(&record).await {
                    warn!(error = %pe, "Failed to persist node after send failure");
                }
            }
            warn!(error = %e, "Failed to dispatch setup request");
            return Err(e.into());
        }

        info!(
            terminator = %address,
            attempts = record.connection_attempts,
            "Setup request dispatched"
        );
        Ok(record)
    }

    /// Apply a setup response or failure delivered by a terminator.
    #[instrument(skip(self, envelope), fields(node = %envelope.meid, message_type = %envelope.message_type))]
    pub async fn on_reply(&self, envelope: Envelope) -> Result<(), ManagerError> {
        let c = &self.components;
        let Some((protocol, successful)) = SetupProtocol::from_reply(envelope.message_type) else {
            return Err(ManagerError::Validation(format!(
                "{} is not a setup reply",
                envelope.message_type
            )));
        };

        let key = envelope.correlation_key().to_string();
        let name = envelope.meid.clone();
        let payload = envelope.payload.clone();

        let Some(resolved) = c.sessions.resolve(&key, RequestKind::is_setup, envelope) else {
            warn!("Setup reply without a pending setup, ignoring");
            return Ok(());
        };

        let _guard = c.locks.lock(&name).await;
        let mut record = c.store.get(&name).await?;

        let outcome = c
            .codec
            .unpack_setup_reply(protocol, successful, &payload)
            .unwrap_or_else(|e| SetupOutcome::Failure {
                cause: "undecodable setup reply".to_string(),
                detail: Some(e.to_string()),
            });

        match outcome {
            SetupOutcome::Success(response) => {
                if !record.apply(ConnectionEvent::SetupSucceeded) {
                    warn!(status = %record.status(), "Setup response for node not connecting, ignoring");
                    return Ok(());
                }
                record.global_id = Some(response.global_id);
                record.node_type = response.node_type;
                record.protocol_configuration = Some(response.configuration);
                record.connection_attempts = 0;
                c.persist(&record).await?;

                info!(
                    elapsed_ms = resolved.elapsed.as_millis() as u64,
                    global_id = ?record.global_id,
                    node_type = %record.node_type,
                    "Node connected"
                );
            }
            SetupOutcome::Failure { cause, detail } => {
                if !record.apply(ConnectionEvent::SetupFailed) {
                    warn!(status = %record.status(), %cause, "Setup failure for node not connecting, ignoring");
                    return Ok(());
                }
                record.setup_failure = Some(match detail {
                    Some(detail) => format!("{cause}: {detail}"),
                    None => cause,
                });
                c.persist(&record).await?;

                warn!(
                    elapsed_ms = resolved.elapsed.as_millis() as u64,
                    failure = ?record.setup_failure,
                    "Node rejected setup"
                );
            }
        }
        Ok(())
    }
}
