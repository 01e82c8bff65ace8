//! Shared harness for manager integration tests.
//!
//! Wires a [`Manager`] to the in-memory store, an in-process transport and a
//! recording routing client, with timeouts short enough for paused-clock
//! tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use e2m_manager::{
    config::ManagerSettings,
    manager::Manager,
    model::NodeRecord,
    orchestrator::SetupRequest,
    routing::MockRoutingClient,
    store::{InMemoryNodeStore, RetryPolicy},
    transport::{ChannelPeer, ChannelTransport},
};
use e2m_protocol::{Envelope, JsonPduCodec, MessageType, SetupProtocol};

pub const TERMINATOR: &str = "10.0.2.15:38000";

pub struct Harness {
    pub manager: Manager,
    pub store: Arc<InMemoryNodeStore>,
    pub routing: Arc<MockRoutingClient>,
    pub peer: ChannelPeer,
}

pub fn test_settings() -> ManagerSettings {
    ManagerSettings {
        store_retry: RetryPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(1),
        },
        shutdown_timeout: Duration::from_millis(50),
        reset_settle: Duration::from_millis(50),
        session_ttl: Duration::from_secs(1),
        keep_alive_interval: Duration::from_millis(100),
        keep_alive_expiration: Duration::from_millis(300),
        ..Default::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: ManagerSettings) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info,e2m_manager=debug".into()),
            )
            .with_test_writer()
            .try_init();

        let store = Arc::new(InMemoryNodeStore::new());
        let routing = Arc::new(MockRoutingClient::new());
        let (transport, peer) = ChannelTransport::pair();
        let manager = Manager::new(
            store.clone(),
            routing.clone(),
            Arc::new(transport),
            Arc::new(JsonPduCodec),
            settings,
        );
        Self {
            manager,
            store,
            routing,
            peer,
        }
    }

    /// A second manager over the same store and routing client, as after a
    /// process restart. Nothing is loaded until `bootstrap` runs.
    pub fn restarted(&self) -> Self {
        let (transport, peer) = ChannelTransport::pair();
        let manager = Manager::new(
            self.store.clone(),
            self.routing.clone(),
            Arc::new(transport),
            Arc::new(JsonPduCodec),
            self.manager.settings().clone(),
        );
        Self {
            manager,
            store: self.store.clone(),
            routing: self.routing.clone(),
            peer,
        }
    }

    /// A harness with one active terminator already announced.
    pub async fn with_terminator() -> Self {
        let harness = Self::new();
        harness.announce(TERMINATOR).await;
        harness
    }

    pub async fn announce(&self, address: &str) {
        self.manager
            .components()
            .terminators
            .add_instance(address, Utc::now())
            .await
            .expect("announce terminator");
    }

    pub async fn record(&self, name: &str) -> NodeRecord {
        self.manager
            .get_node(name)
            .await
            .unwrap_or_else(|e| panic!("node {name} missing: {e}"))
    }

    /// Run an X2 setup for `name` through to CONNECTED.
    pub async fn connect(&self, name: &str) -> NodeRecord {
        self.manager
            .setup_node(SetupRequest::new(name, "10.0.2.15", 8080, SetupProtocol::X2))
            .await
            .expect("setup");
        self.peer.drain_sent().await;
        self.reply(MessageType::X2SetupResponse, name, SETUP_RESPONSE)
            .await;
        self.record(name).await
    }

    /// Reply to the setup request the manager just sent for `name`.
    pub async fn reply(&self, message_type: MessageType, name: &str, payload: &str) {
        self.manager
            .handle_envelope(
                Envelope::new(message_type, name, payload.as_bytes().to_vec())
                    .with_transaction_id(name),
            )
            .await
            .expect("handle reply");
    }
}

pub const SETUP_RESPONSE: &str = r#"{"globalId":{"plmnId":"02f829","nbId":"4a952a0a"}}"#;
