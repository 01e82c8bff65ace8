//! In-process transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use e2m_protocol::Envelope;
use tokio::sync::{mpsc, Mutex};

use super::{MessageTransport, TransportError};

/// Manager side of an in-process link.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    fail_sends: Arc<AtomicBool>,
}

/// Terminator side of an in-process link.
pub struct ChannelPeer {
    inbound: mpsc::UnboundedSender<Envelope>,
    sent: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    fail_sends: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, ChannelPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let fail_sends = Arc::new(AtomicBool::new(false));

        let transport = Self {
            outbound: out_tx,
            inbound: Mutex::new(in_rx),
            fail_sends: fail_sends.clone(),
        };
        let peer = ChannelPeer {
            inbound: in_tx,
            sent: Mutex::new(out_rx),
            fail_sends,
        };
        (transport, peer)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send(format!(
                "link down, dropped {}",
                envelope.message_type
            )));
        }
        self.outbound
            .send(envelope)
            .map_err(|_| TransportError::NoPeers)
    }

    async fn receive(&self) -> Result<Envelope, TransportError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }
}

impl ChannelPeer {
    /// Deliver an envelope to the manager.
    pub fn inject(&self, envelope: Envelope) {
        // A closed manager side just drops it.
        let _ = self.inbound.send(envelope);
    }

    /// Make every manager send fail until reset.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Next envelope the manager sent, waiting for it if needed.
    pub async fn next_sent(&self) -> Option<Envelope> {
        self.sent.lock().await.recv().await
    }

    /// Everything the manager has sent so far.
    pub async fn drain_sent(&self) -> Vec<Envelope> {
        let mut sent = self.sent.lock().await;
        let mut out = Vec::new();
        while let Ok(envelope) = sent.try_recv() {
            out.push(envelope);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2m_protocol::MessageType;

    #[tokio::test]
    async fn test_round_trip_both_directions() {
        let (transport, peer) = ChannelTransport::pair();

        transport
            .send(Envelope::new(MessageType::X2SetupRequest, "ran1", vec![1]))
            .await
            .unwrap();
        let sent = peer.next_sent().await.unwrap();
        assert_eq!(sent.message_type, MessageType::X2SetupRequest);

        peer.inject(Envelope::new(MessageType::X2SetupResponse, "ran1", vec![]));
        let received = transport.receive().await.unwrap();
        assert_eq!(received.meid, "ran1");
    }

    #[tokio::test]
    async fn test_failing_sends() {
        let (transport, peer) = ChannelTransport::pair();
        peer.fail_sends(true);

        let err = transport
            .send(Envelope::new(MessageType::X2Reset, "ran1", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Send(_)));
        assert!(peer.drain_sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_receive_after_peer_dropped_is_closed() {
        let (transport, peer) = ChannelTransport::pair();
        drop(peer);
        assert!(matches!(
            transport.receive().await,
            Err(TransportError::Closed)
        ));
    }
}
