//! Application state shared across request handlers.

use std::sync::Arc;

use crate::manager::Manager;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    manager: Manager,
}

impl AppState {
    pub fn new(manager: Manager) -> Self {
        Self {
            inner: Arc::new(AppStateInner { manager }),
        }
    }

    pub fn manager(&self) -> &Manager {
        &self.inner.manager
    }
}
