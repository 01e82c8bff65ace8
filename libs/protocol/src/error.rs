//! Error types for protocol handling.

use thiserror::Error;

/// Errors raised while interpreting protocol vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The numeric message type is not one this manager understands.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    /// The reset cause is not in the known cause table.
    #[error("unknown reset cause: {0}")]
    UnknownCause(String),

    /// A control payload could not be parsed.
    #[error("invalid payload for {message_type}: {message}")]
    InvalidPayload {
        message_type: String,
        message: String,
    },
}

/// Errors reported by a [`crate::PduCodec`].
///
/// Codecs are opaque; all the manager gets back is a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to pack {pdu}: {message}")]
    Pack { pdu: &'static str, message: String },

    #[error("failed to unpack {pdu}: {message}")]
    Unpack { pdu: &'static str, message: String },
}
