//! Terminator keep-alive supervision.

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::manager::Manager;

pub struct KeepAliveWorker {
    manager: Manager,
}

impl KeepAliveWorker {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let settings = self.manager.settings();
        info!(
            interval_ms = settings.keep_alive_interval.as_millis() as u64,
            expiration_ms = settings.keep_alive_expiration.as_millis() as u64,
            "Starting keep-alive worker"
        );

        let mut interval = tokio::time::interval(settings.keep_alive_interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let affected = self.manager.supervise_terminators().await;
                    if affected > 0 {
                        warn!(affected, "Nodes disconnected after terminator expiry");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Keep-alive worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
