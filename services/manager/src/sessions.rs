//! In-flight request correlation.
//!
//! Every outbound request that expects an answer registers a session keyed by
//! its transaction id (the node name for setup and reset). The receive loop
//! resolves the session when the answer arrives; resolution removes the
//! session and hands the envelope to whoever still holds the matching
//! [`PendingRequest`]. Round-trip times are measured here and nowhere else.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use e2m_protocol::{Envelope, ResetCause, SetupProtocol};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a request for {0} is already in flight")]
    AlreadyPending(String),

    #[error("no session for transaction {0}")]
    NotFound(String),
}

/// What a session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Setup(SetupProtocol),
    Reset(ResetCause),
}

impl RequestKind {
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup(SetupProtocol::X2) => "x2_setup",
            Self::Setup(SetupProtocol::EndcX2) => "endc_x2_setup",
            Self::Reset(_) => "reset",
        }
    }
}

struct Session {
    kind: RequestKind,
    started_at: Instant,
    waiter: oneshot::Sender<Envelope>,
}

/// Snapshot of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub transaction_id: String,
    pub kind: RequestKind,
    pub age: Duration,
}

/// A session closed by a correlated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub kind: RequestKind,
    pub elapsed: Duration,
}

/// Caller's end of a registered session.
#[derive(Debug)]
pub struct PendingRequest {
    transaction_id: String,
    response: oneshot::Receiver<Envelope>,
}

impl PendingRequest {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// The response, if it has already been correlated.
    pub fn try_take(&mut self) -> Option<Envelope> {
        self.response.try_recv().ok()
    }

    /// Wait for the response. `None` if the session was dropped without one.
    pub async fn wait(self) -> Option<Envelope> {
        self.response.await.ok()
    }
}

#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a session. An existing session for the same id is never replaced.
    pub fn register(
        &self,
        transaction_id: &str,
        kind: RequestKind,
    ) -> Result<PendingRequest, SessionError> {
        let mut sessions = self.sessions();
        if sessions.contains_key(transaction_id) {
            return Err(SessionError::AlreadyPending(transaction_id.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        sessions.insert(
            transaction_id.to_string(),
            Session {
                kind,
                started_at: Instant::now(),
                waiter: tx,
            },
        );

        Ok(PendingRequest {
            transaction_id: transaction_id.to_string(),
            response: rx,
        })
    }

    /// Close a session with its response.
    ///
    /// `expects` must accept the session's kind; a response of the wrong kind
    /// leaves the session open and yields `None`.
    pub fn resolve(
        &self,
        transaction_id: &str,
        expects: impl Fn(&RequestKind) -> bool,
        response: Envelope,
    ) -> Option<ResolvedSession> {
        let session = {
            let mut sessions = self.sessions();
            if !expects(&sessions.get(transaction_id)?.kind) {
                return None;
            }
            sessions.remove(transaction_id)?
        };
        let elapsed = session.started_at.elapsed();
        // The caller may have stopped waiting; that is fine.
        let _ = session.waiter.send(response);
        Some(ResolvedSession {
            kind: session.kind,
            elapsed,
        })
    }

    pub fn get(&self, transaction_id: &str) -> Result<SessionInfo, SessionError> {
        self.sessions()
            .get(transaction_id)
            .map(|s| SessionInfo {
                transaction_id: transaction_id.to_string(),
                kind: s.kind,
                age: s.started_at.elapsed(),
            })
            .ok_or_else(|| SessionError::NotFound(transaction_id.to_string()))
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.sessions().contains_key(transaction_id)
    }

    /// Drop a session without a response. Returns whether one existed.
    pub fn cancel(&self, transaction_id: &str) -> bool {
        self.sessions().remove(transaction_id).is_some()
    }

    /// Drop sessions older than `ttl` that nobody is waiting on.
    pub fn expire(&self, ttl: Duration) -> Vec<SessionInfo> {
        let mut sessions = self.sessions();
        let expired: Vec<SessionInfo> = sessions
            .iter()
            .filter(|(_, s)| s.waiter.is_closed() && s.started_at.elapsed() > ttl)
            .map(|(id, s)| SessionInfo {
                transaction_id: id.clone(),
                kind: s.kind,
                age: s.started_at.elapsed(),
            })
            .collect();

        for info in &expired {
            sessions.remove(&info.transaction_id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
