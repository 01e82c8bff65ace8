//! API v1 routes.

mod nodes;
mod terminators;

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/nodebs", nodes::routes())
        .nest("/e2t", terminators::routes())
}
