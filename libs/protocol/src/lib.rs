//! # e2m-protocol
//!
//! Wire-level vocabulary shared by the E2 manager and its tooling.
//!
//! ## Contents
//!
//! - Message types exchanged with terminator instances (`RIC_X2_SETUP_REQ`,
//!   `RIC_SCTP_CONNECTION_FAILURE`, ...) and the [`Envelope`] carrying them
//! - Node identifiers shared by every component ([`NodeType`], [`GlobalNodeId`])
//! - The closed table of X2 reset causes ([`ResetCause`])
//! - The [`PduCodec`] contract behind which the binary X2AP codec lives, plus a
//!   JSON codec used in development and tests
//!
//! The byte layout of X2AP PDUs is deliberately not defined here. Production
//! deployments plug an ASN.1 codec in behind [`PduCodec`].

mod cause;
mod codec;
mod error;
mod types;

pub use cause::{CauseGroup, ResetCause, DEFAULT_RESET_CAUSE};
pub use codec::{JsonPduCodec, PduCodec, SetupOutcome, SetupParameters, SetupResponse};
pub use error::{CodecError, ProtocolError};
pub use types::*;
