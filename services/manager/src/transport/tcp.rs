//! TCP transport.
//!
//! Terminator instances connect to the manager's transport port. Each line on
//! a connection is one JSON-encoded [`Envelope`]. Outbound envelopes are
//! written to every connected terminator; terminators drop traffic for nodes
//! they do not carry.
//!
//! Lines longer than [`MAX_LINE_BYTES`] close the connection. Each terminator
//! has a bounded outbound queue; envelopes for a full queue are dropped.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use e2m_protocol::Envelope;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{MessageTransport, TransportError};

/// Longest accepted inbound line, newline included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

const OUTBOUND_QUEUE: usize = 256;
const INBOUND_QUEUE: usize = 1024;

type Peers = Arc<StdMutex<HashMap<SocketAddr, mpsc::Sender<String>>>>;

/// Serialize an envelope as one line, newline included.
pub fn encode_line(envelope: &Envelope) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line(line: &str) -> Result<Envelope, TransportError> {
    Ok(serde_json::from_str(line.trim_end())?)
}

pub struct TcpTransport {
    local_addr: SocketAddr,
    peers: Peers,
    inbound: Mutex<mpsc::Receiver<Envelope>>,
    accept_task: JoinHandle<()>,
}

impl TcpTransport {
    /// Bind the transport port and start accepting terminators.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Transport listening for terminators");

        let peers: Peers = Arc::default();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let accept_task = tokio::spawn(accept_loop(listener, peers.clone(), inbound_tx));

        Ok(Self {
            local_addr,
            peers,
            inbound: Mutex::new(inbound_rx),
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl MessageTransport for TcpTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let line = encode_line(&envelope)?;
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.retain(|_, tx| !tx.is_closed());
        if peers.is_empty() {
            return Err(TransportError::NoPeers);
        }

        for (peer, tx) in peers.iter() {
            match tx.try_send(line.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(%peer, "Terminator outbound queue full, dropping envelope")
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%peer, "Terminator connection went away during send")
                }
            }
        }
        debug!(
            message_type = %envelope.message_type,
            meid = %envelope.meid,
            peers = peers.len(),
            "Envelope sent"
        );
        Ok(())
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

async fn accept_loop(listener: TcpListener, peers: Peers, inbound: mpsc::Sender<Envelope>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "Terminator connected");
                let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                peers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(peer, tx);
                tokio::spawn(handle_connection(
                    stream,
                    peer,
                    peers.clone(),
                    inbound.clone(),
                    rx,
                ));
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept terminator connection");
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    peers: Peers,
    inbound: mpsc::Sender<Envelope>,
    mut outbound: mpsc::Receiver<String>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut read_task = tokio::spawn(read_loop(reader, peer, inbound));

    loop {
        tokio::select! {
            _ = &mut read_task => break,
            line = outbound.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    warn!(%peer, error = %e, "Terminator write failed");
                    break;
                }
            }
        }
    }
    read_task.abort();

    peers
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&peer);
    info!(%peer, "Terminator disconnected");
}

/// Forward inbound lines until the peer closes, misbehaves or the manager
/// stops receiving.
async fn read_loop(reader: OwnedReadHalf, peer: SocketAddr, inbound: mpsc::Sender<Envelope>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) if buf.last() != Some(&b'\n') && buf.len() >= MAX_LINE_BYTES => {
                warn!(%peer, limit = MAX_LINE_BYTES, "Envelope exceeds line limit, closing");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%peer, error = %e, "Terminator read failed");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => line,
            Err(e) => {
                warn!(%peer, error = %e, "Dropping non-UTF-8 line");
                continue;
            }
        };
        match decode_line(line) {
            Ok(envelope) => {
                if inbound.send(envelope).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(%peer, error = %e, "Dropping malformed envelope"),
        }
    }
}
