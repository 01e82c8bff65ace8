//! RFC 7807 problem responses.

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ManagerError;
use crate::store::StoreError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://e2m.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            code,
            request_id: uuid::Uuid::new_v4().to_string(),
            retryable: false,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn with_status(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.problem.retryable = retryable;
        self
    }
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        let retryable = e.is_retryable();
        let message = e.to_string();
        let error = match &e {
            ManagerError::Validation(_) => Self::bad_request("validation_failed", message),
            ManagerError::NotFound(_) => Self::not_found("not_found", message),
            ManagerError::WrongState { .. } => Self::bad_request("wrong_state", message),
            ManagerError::RequestInFlight(_) => Self::conflict("request_in_flight", message),
            ManagerError::InstancePoolAbsence => {
                Self::service_unavailable("no_terminator_instance", message)
            }
            ManagerError::InstancesUnavailable(_) => {
                Self::service_unavailable("terminators_unavailable", message)
            }
            ManagerError::Store(StoreError::Exhausted { .. }) => {
                Self::service_unavailable("store_unavailable", message)
            }
            ManagerError::Store(_) => Self::internal("store_error", message),
            ManagerError::Transport(_) => Self::internal("transport_error", message),
            ManagerError::Routing(_) => Self::bad_gateway("routing_error", message),
            ManagerError::Codec(_) => Self::internal("codec_error", message),
            ManagerError::Task(_) => Self::internal("task_failed", message),
        };
        error.retryable(retryable)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
