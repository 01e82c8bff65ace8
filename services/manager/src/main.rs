//! E2 manager
//!
//! Manages the connection life-cycle of RAN nodes reached through E2
//! terminator instances. Serves the northbound REST API and consumes
//! terminator notifications.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use e2m_manager::{
    api, config,
    dispatcher::Dispatcher,
    keepalive::KeepAliveWorker,
    manager::Manager,
    routing::HttpRoutingClient,
    state::AppState,
    store::{InMemoryNodeStore, NodeStore, PgNodeStore},
    transport::TcpTransport,
};
use e2m_protocol::JsonPduCodec;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to E2M_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting e2 manager");
    info!(
        listen_addr = %config.listen_addr,
        transport_listen_addr = %config.transport_listen_addr,
        routing_manager_url = %config.routing_manager_url,
        "Configuration loaded"
    );

    let store: Arc<dyn NodeStore> = match &config.database {
        Some(db_config) => {
            let store = match PgNodeStore::connect(db_config).await {
                Ok(store) => {
                    info!("Database connection established");
                    store
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to database");
                    return Err(e.into());
                }
            };
            if let Err(e) = store.run_migrations().await {
                error!(error = %e, "Failed to run migrations");
                return Err(e.into());
            }
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, node records are kept in memory only");
            Arc::new(InMemoryNodeStore::new())
        }
    };

    let routing = Arc::new(HttpRoutingClient::new(config.routing_manager_url.clone())?);
    let transport = Arc::new(TcpTransport::bind(config.transport_listen_addr).await?);
    info!(addr = %transport.local_addr(), "Listening for terminators");

    let manager = Manager::new(
        store,
        routing,
        transport,
        Arc::new(JsonPduCodec),
        config.manager.clone(),
    );

    match manager.bootstrap().await {
        Ok(loaded) => info!(loaded, "Registry seeded from store"),
        Err(e) => {
            error!(error = %e, "Failed to seed registry");
            return Err(e.into());
        }
    }

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(manager.clone(), Duration::from_secs(1));
    let dispatcher_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            dispatcher.run(shutdown_rx).await;
        }
    });

    let keep_alive = KeepAliveWorker::new(manager.clone());
    let keep_alive_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            keep_alive.run(shutdown_rx).await;
        }
    });

    let app = api::create_router(AppState::new(manager));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, dispatcher_handle).await {
        warn!(error = %e, "Dispatcher did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, keep_alive_handle).await {
        warn!(error = %e, "Keep-alive worker did not shut down in time");
    }

    info!("E2 manager shutdown complete");
    Ok(())
}
