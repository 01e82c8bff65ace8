//! Node endpoints.
//!
//! Nodes are addressed by name: /v1/nodebs/{name}

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use e2m_protocol::SetupProtocol;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::model::{NodeIdentity, NodeRecord};
use crate::orchestrator::{ResetOutcome, SetupRequest, ShutdownReport};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ids", get(list_nodes))
        .route("/x2-setup", post(x2_setup))
        .route("/endc-setup", post(endc_setup))
        .route("/shutdown", put(shutdown))
        .route("/{name}", get(get_node).merge(delete(remove_node)))
        .route("/{name}/reset", put(reset_node))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub cause: Option<String>,
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeIdentity>> {
    Json(state.manager().list_nodes().await)
}

async fn get_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NodeRecord>, ApiError> {
    Ok(Json(state.manager().get_node(&name).await?))
}

async fn x2_setup(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<NodeRecord>, ApiError> {
    setup(state, request, SetupProtocol::X2).await
}

async fn endc_setup(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<NodeRecord>, ApiError> {
    setup(state, request, SetupProtocol::EndcX2).await
}

async fn setup(
    state: AppState,
    mut request: SetupRequest,
    protocol: SetupProtocol,
) -> Result<Json<NodeRecord>, ApiError> {
    request.protocol = protocol;
    Ok(Json(state.manager().setup_node(request).await?))
}

/// The body is optional; an empty body resets with the default cause.
async fn reset_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ResetOutcome>, ApiError> {
    let request: ResetRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request("invalid_body", e.to_string()))?
    };

    let outcome = state
        .manager()
        .reset_node(&name, request.cause.as_deref())
        .await?;
    Ok(Json(outcome))
}

async fn shutdown(State(state): State<AppState>) -> Result<Json<ShutdownReport>, ApiError> {
    Ok(Json(state.manager().shutdown_all().await?))
}

async fn remove_node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.manager().remove_node(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
