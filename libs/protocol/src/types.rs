//! Message types, envelopes and node identifiers.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// =============================================================================
// Message Types
// =============================================================================

/// Numeric message types as routed by the RIC message router.
pub mod message_codes {
    pub const RIC_X2_SETUP_REQ: u32 = 10060;
    pub const RIC_X2_SETUP_RESP: u32 = 10061;
    pub const RIC_X2_SETUP_FAILURE: u32 = 10062;
    pub const RIC_X2_RESET: u32 = 10070;
    pub const RIC_X2_RESET_RESP: u32 = 10071;
    pub const RIC_ENDC_X2_SETUP_REQ: u32 = 10360;
    pub const RIC_ENDC_X2_SETUP_RESP: u32 = 10361;
    pub const RIC_ENDC_X2_SETUP_FAILURE: u32 = 10362;
    pub const RIC_SCTP_CONNECTION_FAILURE: u32 = 1080;
    pub const RIC_SCTP_CLEAR_ALL: u32 = 1090;
    pub const E2_TERM_INIT: u32 = 1100;
    pub const E2_TERM_KEEP_ALIVE_REQ: u32 = 1101;
    pub const E2_TERM_KEEP_ALIVE_RESP: u32 = 1102;
}

/// A message type understood by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum MessageType {
    X2SetupRequest,
    X2SetupResponse,
    X2SetupFailure,
    X2Reset,
    X2ResetResponse,
    EndcX2SetupRequest,
    EndcX2SetupResponse,
    EndcX2SetupFailure,
    SctpConnectionFailure,
    SctpClearAll,
    TerminatorInit,
    TerminatorKeepAliveRequest,
    TerminatorKeepAliveResponse,
}

impl MessageType {
    /// Router code for this message type.
    pub fn code(&self) -> u32 {
        use message_codes::*;
        match self {
            Self::X2SetupRequest => RIC_X2_SETUP_REQ,
            Self::X2SetupResponse => RIC_X2_SETUP_RESP,
            Self::X2SetupFailure => RIC_X2_SETUP_FAILURE,
            Self::X2Reset => RIC_X2_RESET,
            Self::X2ResetResponse => RIC_X2_RESET_RESP,
            Self::EndcX2SetupRequest => RIC_ENDC_X2_SETUP_REQ,
            Self::EndcX2SetupResponse => RIC_ENDC_X2_SETUP_RESP,
            Self::EndcX2SetupFailure => RIC_ENDC_X2_SETUP_FAILURE,
            Self::SctpConnectionFailure => RIC_SCTP_CONNECTION_FAILURE,
            Self::SctpClearAll => RIC_SCTP_CLEAR_ALL,
            Self::TerminatorInit => E2_TERM_INIT,
            Self::TerminatorKeepAliveRequest => E2_TERM_KEEP_ALIVE_REQ,
            Self::TerminatorKeepAliveResponse => E2_TERM_KEEP_ALIVE_RESP,
        }
    }

    /// Conventional router name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::X2SetupRequest => "RIC_X2_SETUP_REQ",
            Self::X2SetupResponse => "RIC_X2_SETUP_RESP",
            Self::X2SetupFailure => "RIC_X2_SETUP_FAILURE",
            Self::X2Reset => "RIC_X2_RESET",
            Self::X2ResetResponse => "RIC_X2_RESET_RESP",
            Self::EndcX2SetupRequest => "RIC_ENDC_X2_SETUP_REQ",
            Self::EndcX2SetupResponse => "RIC_ENDC_X2_SETUP_RESP",
            Self::EndcX2SetupFailure => "RIC_ENDC_X2_SETUP_FAILURE",
            Self::SctpConnectionFailure => "RIC_SCTP_CONNECTION_FAILURE",
            Self::SctpClearAll => "RIC_SCTP_CLEAR_ALL",
            Self::TerminatorInit => "E2_TERM_INIT",
            Self::TerminatorKeepAliveRequest => "E2_TERM_KEEP_ALIVE_REQ",
            Self::TerminatorKeepAliveResponse => "E2_TERM_KEEP_ALIVE_RESP",
        }
    }

    /// Returns true for setup responses and failures of either protocol.
    pub fn is_setup_reply(&self) -> bool {
        matches!(
            self,
            Self::X2SetupResponse
                | Self::X2SetupFailure
                | Self::EndcX2SetupResponse
                | Self::EndcX2SetupFailure
        )
    }
}

impl From<MessageType> for u32 {
    fn from(value: MessageType) -> Self {
        value.code()
    }
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        use message_codes::*;
        let message_type = match code {
            RIC_X2_SETUP_REQ => Self::X2SetupRequest,
            RIC_X2_SETUP_RESP => Self::X2SetupResponse,
            RIC_X2_SETUP_FAILURE => Self::X2SetupFailure,
            RIC_X2_RESET => Self::X2Reset,
            RIC_X2_RESET_RESP => Self::X2ResetResponse,
            RIC_ENDC_X2_SETUP_REQ => Self::EndcX2SetupRequest,
            RIC_ENDC_X2_SETUP_RESP => Self::EndcX2SetupResponse,
            RIC_ENDC_X2_SETUP_FAILURE => Self::EndcX2SetupFailure,
            RIC_SCTP_CONNECTION_FAILURE => Self::SctpConnectionFailure,
            RIC_SCTP_CLEAR_ALL => Self::SctpClearAll,
            E2_TERM_INIT => Self::TerminatorInit,
            E2_TERM_KEEP_ALIVE_REQ => Self::TerminatorKeepAliveRequest,
            E2_TERM_KEEP_ALIVE_RESP => Self::TerminatorKeepAliveResponse,
            other => return Err(ProtocolError::UnknownMessageType(other)),
        };
        Ok(message_type)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// A routed message.
///
/// `meid` is the managed entity: the node name for node-scoped traffic, the
/// terminator address for terminator control traffic, empty for broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub meid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(message_type: MessageType, meid: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            message_type,
            meid: meid.into(),
            transaction_id: None,
            payload,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    /// Transaction id, falling back to the managed entity name.
    pub fn correlation_key(&self) -> &str {
        self.transaction_id.as_deref().unwrap_or(&self.meid)
    }
}

// =============================================================================
// Node Identifiers
// =============================================================================

/// Base station flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Enb,
    Gnb,
    #[default]
    Unknown,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enb => "ENB",
            Self::Gnb => "GNB",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENB" => Some(Self::Enb),
            "GNB" => Some(Self::Gnb),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global node identity: PLMN id plus node id, both hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalNodeId {
    pub plmn_id: String,
    pub nb_id: String,
}

impl GlobalNodeId {
    pub fn new(plmn_id: impl Into<String>, nb_id: impl Into<String>) -> Self {
        Self {
            plmn_id: plmn_id.into(),
            nb_id: nb_id.into(),
        }
    }
}

impl std::fmt::Display for GlobalNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.plmn_id, self.nb_id)
    }
}

/// Setup protocol variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupProtocol {
    /// Legacy X2 setup (eNB to eNB).
    #[default]
    X2,
    /// EN-DC X2 setup (dual connectivity, eNB to gNB).
    EndcX2,
}

impl SetupProtocol {
    pub fn request_type(&self) -> MessageType {
        match self {
            Self::X2 => MessageType::X2SetupRequest,
            Self::EndcX2 => MessageType::EndcX2SetupRequest,
        }
    }

    /// Protocol a setup reply belongs to, and whether it reports success.
    pub fn from_reply(message_type: MessageType) -> Option<(Self, bool)> {
        match message_type {
            MessageType::X2SetupResponse => Some((Self::X2, true)),
            MessageType::X2SetupFailure => Some((Self::X2, false)),
            MessageType::EndcX2SetupResponse => Some((Self::EndcX2, true)),
            MessageType::EndcX2SetupFailure => Some((Self::EndcX2, false)),
            _ => None,
        }
    }
}

// =============================================================================
// Terminator Control Payloads
// =============================================================================

/// Payload of `E2_TERM_INIT` and `E2_TERM_KEEP_ALIVE_RESP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatorAnnouncement {
    pub address: String,
}

impl TerminatorAnnouncement {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(message_type: MessageType, payload: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(payload).map_err(|e| ProtocolError::InvalidPayload {
            message_type: message_type.name().to_string(),
            message: e.to_string(),
        })
    }
}
