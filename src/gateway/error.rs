use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::status::{RAGVISION_STATUS_ERROR, RAGVISION_STATUS_HEADER};
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error("no route for {0}")]
    NotFound(String),

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
}

impl GatewayError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Body(rejection) => (rejection.status(), "invalid_request"),
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::MethodNotAllowed { .. } => {
                (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed")
            }
            GatewayError::Pipeline(err) => {
                let code = match err {
                    PipelineError::InvalidImage(_)
                    | PipelineError::InvalidRequest(_)
                    | PipelineError::UnknownLabel(_) => StatusCode::BAD_REQUEST,
                    PipelineError::EmptySupportSet => StatusCode::CONFLICT,
                    PipelineError::UpstreamModel(_) => StatusCode::BAD_GATEWAY,
                    PipelineError::DimensionMismatch { .. }
                    | PipelineError::Embedding(_)
                    | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (code, err.kind())
            }
            GatewayError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            GatewayError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, ragvision_status) = self.status();

        let mut headers = HeaderMap::new();
        headers.insert(
            RAGVISION_STATUS_HEADER,
            HeaderValue::from_str(ragvision_status)
                .unwrap_or(HeaderValue::from_static(RAGVISION_STATUS_ERROR)),
        );

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
