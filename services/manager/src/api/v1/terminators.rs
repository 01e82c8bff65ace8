//! Terminator instance endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::terminators::InstanceState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/list", get(list_terminators))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatorResponse {
    #[serde(rename = "e2tAddress")]
    pub address: String,
    pub state: InstanceState,
    pub ran_names: Vec<String>,
    pub last_keep_alive: String,
}

async fn list_terminators(State(state): State<AppState>) -> Json<Vec<TerminatorResponse>> {
    let items = state
        .manager()
        .list_terminators()
        .await
        .into_iter()
        .map(|i| TerminatorResponse {
            address: i.address,
            state: i.state,
            ran_names: i.associated_nodes.into_iter().collect(),
            last_keep_alive: i.last_keep_alive.to_rfc3339(),
        })
        .collect();
    Json(items)
}
