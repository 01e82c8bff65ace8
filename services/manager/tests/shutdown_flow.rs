//! Mass shutdown integration tests.

mod common;

use std::time::Duration;

use common::{test_settings, Harness};
use e2m_manager::{
    config::ManagerSettings, error::ManagerError, model::ConnectionStatus,
    orchestrator::SetupRequest, store::StoreError,
};
use e2m_protocol::{MessageType, SetupProtocol};

#[tokio::test]
async fn test_shutdown_reaches_every_node() {
    let h = Harness::with_settings(ManagerSettings {
        shutdown_timeout: Duration::ZERO,
        ..test_settings()
    });
    h.announce(common::TERMINATOR).await;
    h.connect("ran1").await;
    h.connect("ran2").await;
    // ran3 stays CONNECTING.
    h.manager
        .setup_node(SetupRequest::new("ran3", "10.0.2.17", 8080, SetupProtocol::X2))
        .await
        .unwrap();
    h.peer.drain_sent().await;

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.shutting_down, 3);
    assert_eq!(report.finalized, 3);
    assert_eq!(report.failed, 0);

    for name in ["ran1", "ran2", "ran3"] {
        let record = h.record(name).await;
        assert_eq!(record.status(), ConnectionStatus::ShutDown, "{name}");
        assert_eq!(record.associated_terminator, None);
    }
    assert!(!h.manager.components().sessions.contains("ran3"));

    let sent = h.peer.drain_sent().await;
    assert!(sent.iter().any(|e| e.message_type == MessageType::SctpClearAll));

    let instance = h
        .manager
        .components()
        .terminators
        .get(common::TERMINATOR)
        .await
        .unwrap();
    assert!(instance.associated_nodes.is_empty());
}

#[tokio::test]
async fn test_disconnected_nodes_shut_down_immediately() {
    let h = Harness::new();
    let _ = h
        .manager
        .setup_node(SetupRequest::new("ran1", "10.0.2.15", 8080, SetupProtocol::X2))
        .await;

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.shut_down_immediately, 1);
    assert_eq!(report.finalized, 0);
    assert_eq!(h.record("ran1").await.status(), ConnectionStatus::ShutDown);
    // Nothing changed state through SHUTTING_DOWN, but the clear-all still
    // goes out for the immediate transition.
    assert!(h
        .peer
        .drain_sent()
        .await
        .iter()
        .any(|e| e.message_type == MessageType::SctpClearAll));
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;

    h.manager.shutdown_all().await.unwrap();
    h.peer.drain_sent().await;

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.finalized, 0);
    assert!(h.peer.drain_sent().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_with_no_nodes() {
    let h = Harness::with_terminator().await;

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.total, 0);
    assert!(h.peer.drain_sent().await.is_empty());
}

#[tokio::test]
async fn test_one_failed_node_does_not_stop_the_batch() {
    let h = Harness::with_terminator().await;
    for name in ["ran1", "ran2", "ran3"] {
        h.connect(name).await;
    }
    h.store
        .fail_save_of("ran2", StoreError::Permanent("constraint violation".into()));

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.shutting_down, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.finalized, 2);

    for name in ["ran1", "ran3"] {
        assert_eq!(h.record(name).await.status(), ConnectionStatus::ShutDown, "{name}");
    }
    assert_eq!(h.record("ran2").await.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn test_shutdown_lists_nodes_from_registry() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;
    h.store.reset_call_count();

    let report = h.manager.shutdown_all().await.unwrap();
    assert_eq!(report.finalized, 1);
    // get + save per node in each phase; no list call.
    assert_eq!(h.store.call_count(), 4);
}

#[tokio::test]
async fn test_abandoned_shutdown_still_finishes() {
    let h = Harness::with_settings(ManagerSettings {
        shutdown_timeout: Duration::from_millis(500),
        ..test_settings()
    });
    h.announce(common::TERMINATOR).await;
    h.connect("ran1").await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), h.manager.shutdown_all()).await;
    assert!(abandoned.is_err());
    assert_eq!(h.record("ran1").await.status(), ConnectionStatus::ShuttingDown);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(h.record("ran1").await.status(), ConnectionStatus::ShutDown);
}

#[tokio::test]
async fn test_setup_after_shutdown_is_rejected() {
    let h = Harness::with_terminator().await;
    h.connect("ran1").await;
    h.manager.shutdown_all().await.unwrap();

    let err = h
        .manager
        .setup_node(SetupRequest::new("ran1", "10.0.2.15", 8080, SetupProtocol::X2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::WrongState {
            status: ConnectionStatus::ShutDown,
            ..
        }
    ));
}
