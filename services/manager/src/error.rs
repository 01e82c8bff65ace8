//! Errors returned by manager operations.

use e2m_protocol::CodecError;
use thiserror::Error;

use crate::model::ConnectionStatus;
use crate::routing::RoutingError;
use crate::sessions::SessionError;
use crate::store::StoreError;
use crate::terminators::InstanceError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ManagerError {
    /// The request itself is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),

    /// No terminator instance is registered at all.
    #[error("no terminator instance available")]
    InstancePoolAbsence,

    /// Terminator instances exist but none can take the node right now.
    #[error("terminator instances unavailable: {0}")]
    InstancesUnavailable(String),

    #[error("node {node} is {status}; cannot {operation}")]
    WrongState {
        node: String,
        status: ConnectionStatus,
        operation: &'static str,
    },

    /// A setup or reset for the node is still awaiting its response.
    #[error("request for {0} already in flight")]
    RequestInFlight(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A detached flow (shutdown, reset settling) panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ManagerError {
    pub fn wrong_state(node: &str, status: ConnectionStatus, operation: &'static str) -> Self {
        Self::WrongState {
            node: node.to_string(),
            status,
            operation,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InstancesUnavailable(_)
                | Self::RequestInFlight(_)
                | Self::Store(StoreError::Exhausted { .. })
        )
    }
}

impl From<StoreError> for ManagerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => Self::NotFound(format!("node {name}")),
            other => Self::Store(other),
        }
    }
}

impl From<InstanceError> for ManagerError {
    fn from(e: InstanceError) -> Self {
        match e {
            InstanceError::NoInstanceAvailable => Self::InstancePoolAbsence,
            e @ InstanceError::InstancesUnavailable { .. } => {
                Self::InstancesUnavailable(e.to_string())
            }
            InstanceError::UnknownInstance(address) => {
                Self::NotFound(format!("terminator instance {address}"))
            }
            InstanceError::Routing(e) => Self::Routing(e),
        }
    }
}

impl From<SessionError> for ManagerError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AlreadyPending(id) => Self::RequestInFlight(id),
            SessionError::NotFound(id) => Self::NotFound(format!("session {id}")),
        }
    }
}
