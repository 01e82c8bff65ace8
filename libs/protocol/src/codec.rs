//! PDU codec contract.
//!
//! The manager never looks inside X2AP PDUs. It hands setup parameters to a
//! codec and gets bytes back, and it hands reply bytes to the codec and gets a
//! [`SetupOutcome`] back.

use serde::{Deserialize, Serialize};

use crate::cause::ResetCause;
use crate::error::CodecError;
use crate::types::{GlobalNodeId, NodeType, SetupProtocol};

/// Parameters needed to build a setup request PDU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParameters {
    pub protocol: SetupProtocol,
    /// PLMN id of this controller.
    pub ric_plmn_id: String,
    /// Near-RT RIC id of this controller.
    pub ric_near_rt_id: String,
}

/// Fields extracted from a successful setup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub global_id: GlobalNodeId,
    #[serde(default)]
    pub node_type: NodeType,
    /// Served cells and neighbour information, opaque to the manager.
    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// Decoded setup reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupOutcome {
    Success(SetupResponse),
    Failure {
        cause: String,
        detail: Option<String>,
    },
}

/// Pack/unpack contract of the X2AP codec.
pub trait PduCodec: Send + Sync {
    fn pack_setup_request(&self, params: &SetupParameters) -> Result<Vec<u8>, CodecError>;

    /// Decode a setup reply. `successful` reflects the reply's message type.
    fn unpack_setup_reply(
        &self,
        protocol: SetupProtocol,
        successful: bool,
        payload: &[u8],
    ) -> Result<SetupOutcome, CodecError>;

    fn pack_reset_request(&self, cause: &ResetCause) -> Result<Vec<u8>, CodecError>;
}

/// JSON stand-in for the binary codec.
///
/// Used by the development build and by tests; terminators speaking to a
/// development manager exchange these documents instead of X2AP PDUs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPduCodec;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupFailureDocument {
    cause: String,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetDocument<'a> {
    cause: &'a str,
    group: crate::cause::CauseGroup,
    value: u8,
}

impl PduCodec for JsonPduCodec {
    fn pack_setup_request(&self, params: &SetupParameters) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(params).map_err(|e| CodecError::Pack {
            pdu: "setup request",
            message: e.to_string(),
        })
    }

    fn unpack_setup_reply(
        &self,
        protocol: SetupProtocol,
        successful: bool,
        payload: &[u8],
    ) -> Result<SetupOutcome, CodecError> {
        if successful {
            let mut response: SetupResponse =
                serde_json::from_slice(payload).map_err(|e| CodecError::Unpack {
                    pdu: "setup response",
                    message: e.to_string(),
                })?;
            // EN-DC setup responses always come from a gNB.
            if protocol == SetupProtocol::EndcX2 && response.node_type == NodeType::Unknown {
                response.node_type = NodeType::Gnb;
            }
            if protocol == SetupProtocol::X2 && response.node_type == NodeType::Unknown {
                response.node_type = NodeType::Enb;
            }
            Ok(SetupOutcome::Success(response))
        } else {
            let failure: SetupFailureDocument =
                serde_json::from_slice(payload).map_err(|e| CodecError::Unpack {
                    pdu: "setup failure",
                    message: e.to_string(),
                })?;
            Ok(SetupOutcome::Failure {
                cause: failure.cause,
                detail: failure.detail,
            })
        }
    }

    fn pack_reset_request(&self, cause: &ResetCause) -> Result<Vec<u8>, CodecError> {
        let doc = ResetDocument {
            cause: cause.name(),
            group: cause.group,
            value: cause.value,
        };
        serde_json::to_vec(&doc).map_err(|e| CodecError::Pack {
            pdu: "reset request",
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_success_fills_node_type() {
        let payload = br#"{"globalId":{"plmnId":"02f829","nbId":"4a952a0a"}}"#;
        let outcome = JsonPduCodec
            .unpack_setup_reply(SetupProtocol::EndcX2, true, payload)
            .unwrap();

        match outcome {
            SetupOutcome::Success(resp) => {
                assert_eq!(resp.global_id, GlobalNodeId::new("02f829", "4a952a0a"));
                assert_eq!(resp.node_type, NodeType::Gnb);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_unpack_failure() {
        let payload = br#"{"cause":"misc:hardware-failure","detail":"timeToWait=v5s"}"#;
        let outcome = JsonPduCodec
            .unpack_setup_reply(SetupProtocol::X2, false, payload)
            .unwrap();

        assert_eq!(
            outcome,
            SetupOutcome::Failure {
                cause: "misc:hardware-failure".to_string(),
                detail: Some("timeToWait=v5s".to_string()),
            }
        );
    }

    #[test]
    fn test_unpack_garbage_is_error() {
        let err = JsonPduCodec
            .unpack_setup_reply(SetupProtocol::X2, true, b"\x00\x01")
            .unwrap_err();
        assert!(matches!(err, CodecError::Unpack { pdu: "setup response", .. }));
    }

    #[test]
    fn test_pack_reset_request() {
        let cause = ResetCause::parse("transport:unspecified").unwrap();
        let bytes = JsonPduCodec.pack_reset_request(&cause).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["cause"], "transport:unspecified");
        assert_eq!(json["group"], "transport");
        assert_eq!(json["value"], 1);
    }
}
