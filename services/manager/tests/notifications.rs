//! Terminator notifications: connection loss, instance announcements and
//! keep-alive supervision.

mod common;

use chrono::Utc;
use common::{Harness, TERMINATOR};
use e2m_manager::{
    error::ManagerError, model::ConnectionStatus, routing::RoutingCall,
    terminators::InstanceState,
};
use e2m_protocol::{Envelope, MessageType, TerminatorAnnouncement};

fn announcement(message_type: MessageType, address: &str) -> Envelope {
    let payload = TerminatorAnnouncement {
        address: address.to_string(),
    }
    .encode();
    Envelope::new(message_type, "", payload)
}

#[tokio::test]
async fn test_connection_failure_disconnects_node() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;

    h.manager
        .handle_envelope(Envelope::new(
            MessageType::SctpConnectionFailure,
            "ran1",
            Vec::new(),
        ))
        .await
        .unwrap();

    let record = h.record("ran1").await;
    assert_eq!(record.status(), ConnectionStatus::Disconnected);
    assert_eq!(record.associated_terminator, None);
    assert!(h
        .routing
        .calls()
        .contains(&RoutingCall::Dissociate(TERMINATOR.into(), "ran1".into())));

    let listed = h.manager.list_nodes().await;
    assert_eq!(listed[0].connection_status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_connection_failure_twice_is_harmless() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;

    let lost = Envelope::new(MessageType::SctpConnectionFailure, "ran1", Vec::new());
    h.manager.handle_envelope(lost.clone()).await.unwrap();
    let calls = h.routing.calls().len();
    h.manager.handle_envelope(lost).await.unwrap();

    assert_eq!(h.routing.calls().len(), calls);
    assert_eq!(
        h.record("ran1").await.status(),
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_connection_failure_during_shutdown() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;
    h.manager.shutdown_all().await.unwrap();

    h.manager
        .handle_envelope(Envelope::new(
            MessageType::SctpConnectionFailure,
            "ran1",
            Vec::new(),
        ))
        .await
        .unwrap();
    assert_eq!(h.record("ran1").await.status(), ConnectionStatus::ShutDown);
}

#[tokio::test]
async fn test_connection_failure_for_unknown_node() {
    let h = Harness::with_terminator().await;

    let err = h
        .manager
        .handle_envelope(Envelope::new(
            MessageType::SctpConnectionFailure,
            "ghost",
            Vec::new(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::NotFound(_)));
}

#[tokio::test]
async fn test_terminator_init_registers_instance() {
    let h = Harness::new();

    h.manager
        .handle_envelope(announcement(MessageType::TerminatorInit, TERMINATOR))
        .await
        .unwrap();

    let instances = h.manager.list_terminators().await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].address, TERMINATOR);
    assert_eq!(instances[0].state, InstanceState::Active);
    assert!(h
        .routing
        .calls()
        .contains(&RoutingCall::AddInstance(TERMINATOR.into())));
}

#[tokio::test]
async fn test_malformed_announcement_is_rejected() {
    let h = Harness::new();

    let err = h
        .manager
        .handle_envelope(Envelope::new(
            MessageType::TerminatorInit,
            "",
            b"{}".to_vec(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Validation(_)));
    assert!(h.manager.list_terminators().await.is_empty());
}

#[tokio::test]
async fn test_keep_alive_refreshes_instance() {
    let h = Harness::new();
    let stale = Utc::now() - chrono::Duration::seconds(10);
    h.manager
        .components()
        .terminators
        .add_instance(TERMINATOR, stale)
        .await
        .unwrap();

    h.manager
        .handle_envelope(announcement(
            MessageType::TerminatorKeepAliveResponse,
            TERMINATOR,
        ))
        .await
        .unwrap();

    assert_eq!(h.manager.supervise_terminators().await, 0);
    assert_eq!(h.manager.list_terminators().await.len(), 1);
    assert!(h
        .peer
        .drain_sent()
        .await
        .iter()
        .any(|e| e.message_type == MessageType::TerminatorKeepAliveRequest));
}

#[tokio::test]
async fn test_expired_terminator_disconnects_its_nodes() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;
    h.connect("ran2").await;

    // Re-announce with an old timestamp so the next supervision round expires it.
    let stale = Utc::now() - chrono::Duration::seconds(10);
    h.manager
        .components()
        .terminators
        .record_keep_alive(TERMINATOR, stale)
        .await;

    let affected = h.manager.supervise_terminators().await;
    assert_eq!(affected, 2);
    assert!(h.manager.list_terminators().await.is_empty());

    for name in ["ran1", "ran2"] {
        let record = h.record(name).await;
        assert_eq!(record.status(), ConnectionStatus::Disconnected);
        assert_eq!(record.associated_terminator, None);
    }

    let calls = h.routing.calls();
    assert!(calls.contains(&RoutingCall::RemoveInstance(
        TERMINATOR.into(),
        vec!["ran1".into(), "ran2".into()]
    )));
    assert!(!calls
        .iter()
        .any(|c| matches!(c, RoutingCall::Dissociate(..))));
}

#[tokio::test]
async fn test_removed_terminator_is_not_selected() {
    let h = Harness::with_terminator().await;
    let stale = Utc::now() - chrono::Duration::seconds(10);
    h.manager
        .components()
        .terminators
        .record_keep_alive(TERMINATOR, stale)
        .await;
    h.manager.supervise_terminators().await;

    let err = h
        .manager
        .setup_node(e2m_manager::orchestrator::SetupRequest::new(
            "ran1",
            "10.0.2.15",
            8080,
            e2m_protocol::SetupProtocol::X2,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::InstancePoolAbsence));
}

#[tokio::test]
async fn test_expiry_after_restart_disconnects_persisted_nodes() {
    let before = Harness::with_terminator().await;
    before.connect("ran1").await;

    let h = before.restarted();
    h.manager.bootstrap().await.unwrap();

    let stale = Utc::now() - chrono::Duration::seconds(10);
    h.manager
        .components()
        .terminators
        .add_instance(TERMINATOR, stale)
        .await
        .unwrap();
    let instance = h.manager.components().terminators.get(TERMINATOR).await.unwrap();
    assert!(instance.associated_nodes.contains("ran1"));

    let affected = h.manager.supervise_terminators().await;
    assert_eq!(affected, 1);

    let record = h.record("ran1").await;
    assert_eq!(record.status(), ConnectionStatus::Disconnected);
    assert_eq!(record.associated_terminator, None);
}
