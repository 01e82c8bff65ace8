//! Node records and identities.

use e2m_protocol::{GlobalNodeId, NodeType, SetupProtocol};
use serde::{Deserialize, Serialize};

use crate::state_machine::{transition, ConnectionEvent};

/// Connection life-cycle state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ConnectedSetupFailed,
    ShuttingDown,
    ShutDown,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::ConnectedSetupFailed => "CONNECTED_SETUP_FAILED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::ShutDown => "SHUT_DOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DISCONNECTED" => Some(Self::Disconnected),
            "CONNECTING" => Some(Self::Connecting),
            "CONNECTED" => Some(Self::Connected),
            "CONNECTED_SETUP_FAILED" => Some(Self::ConnectedSetupFailed),
            "SHUTTING_DOWN" => Some(Self::ShuttingDown),
            "SHUT_DOWN" => Some(Self::ShutDown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent description of a node.
///
/// The store owns records; everything else works on copies. The connection
/// status is private so that it can only move through [`NodeRecord::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default)]
    connection_status: ConnectionStatus,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub setup_protocol: SetupProtocol,
    /// Terminator instance currently carrying the node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_terminator: Option<String>,
    #[serde(default)]
    pub connection_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<GlobalNodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_configuration: Option<serde_json::Value>,
    /// Set only while the node is `CONNECTED_SETUP_FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_failure: Option<String>,
}

impl NodeRecord {
    /// A fresh, disconnected record.
    pub fn new(
        name: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        setup_protocol: SetupProtocol,
    ) -> Self {
        Self {
            name: name.into(),
            node_type: NodeType::Unknown,
            connection_status: ConnectionStatus::Disconnected,
            ip: ip.into(),
            port,
            setup_protocol,
            associated_terminator: None,
            connection_attempts: 0,
            global_id: None,
            protocol_configuration: None,
            setup_failure: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection_status
    }

    /// Run `event` through the state machine. Returns whether it was accepted.
    ///
    /// Leaving `CONNECTED_SETUP_FAILED` drops the failure detail.
    pub fn apply(&mut self, event: ConnectionEvent) -> bool {
        let t = transition(self.connection_status, event);
        if t.accepted {
            self.connection_status = t.next;
            if t.next != ConnectionStatus::ConnectedSetupFailed {
                self.setup_failure = None;
            }
        }
        t.accepted
    }

    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            name: self.name.clone(),
            node_type: self.node_type,
            global_id: self.global_id.clone(),
            connection_status: self.connection_status,
        }
    }
}

/// Lightweight view of a node, kept in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    pub name: String,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<GlobalNodeId>,
    pub connection_status: ConnectionStatus,
}
