//! Inbound message loop.
//!
//! Pulls envelopes from the transport and hands each one to its own task, so
//! a slow store call for one node never stalls the pull loop. Sessions that
//! outlived their TTL are swept on every tick.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::manager::Manager;
use crate::transport::TransportError;

pub struct Dispatcher {
    manager: Manager,
    sweep_interval: Duration,
}

impl Dispatcher {
    pub fn new(manager: Manager, sweep_interval: Duration) -> Self {
        Self {
            manager,
            sweep_interval,
        }
    }

    /// Run until shutdown is signaled or the transport closes.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            sweep_interval_ms = self.sweep_interval.as_millis() as u64,
            "Starting dispatcher"
        );

        let transport = self.manager.components().transport.clone();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.tick().await;

        loop {
            tokio::select! {
                received = transport.receive() => {
                    match received {
                        Ok(envelope) => {
                            let manager = self.manager.clone();
                            tokio::spawn(async move {
                                let message_type = envelope.message_type;
                                let meid = envelope.meid.clone();
                                if let Err(e) = manager.handle_envelope(envelope).await {
                                    error!(%message_type, %meid, error = %e, "Failed to handle envelope");
                                }
                            });
                        }
                        Err(TransportError::Closed) => {
                            warn!("Transport closed, dispatcher stopping");
                            break;
                        }
                        Err(e) => warn!(error = %e, "Receive failed"),
                    }
                }
                _ = sweep.tick() => {
                    let expired = self.manager.sweep_sessions();
                    if expired > 0 {
                        debug!(expired, "Swept sessions");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }
}
