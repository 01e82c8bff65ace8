//! Message transport to and from terminator instances.
//!
//! Two implementations:
//! - [`TcpTransport`]: terminators connect to the manager and exchange
//!   newline-delimited JSON envelopes
//! - [`ChannelTransport`]: in-process channels, for embedding and tests

mod channel;
mod tcp;

pub use channel::{ChannelPeer, ChannelTransport};
pub use tcp::{decode_line, encode_line, TcpTransport};

use async_trait::async_trait;
use e2m_protocol::Envelope;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// No more messages will be received.
    #[error("transport closed")]
    Closed,

    /// Nothing to send to.
    #[error("no terminator connected")]
    NoPeers,

    #[error("send failed: {0}")]
    Send(String),

    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Wait for the next inbound envelope.
    async fn receive(&self) -> Result<Envelope, TransportError>;
}
