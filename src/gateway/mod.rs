//! HTTP gateway (Axum) over the inference pipeline.
//!
//! Used by the `ragvision` server binary; tests drive the router in-process.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;
pub mod status;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{
    ApiJson, invocations_handler, method_not_allowed_handler, not_found_handler,
    support_upload_handler,
};
pub use payload::{
    InvocationRequest, InvocationResponse, OriginalSize, SupportUploadRequest,
    SupportUploadResponse,
};
pub use state::HandlerState;
pub use status::{
    RAGVISION_STATUS_ERROR, RAGVISION_STATUS_HEADER, RAGVISION_STATUS_HEALTHY,
    RAGVISION_STATUS_NOT_READY, RAGVISION_STATUS_READY, RagVisionStatus,
};

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/ragvision/healthcheck", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/ragvision/invocations", post(invocations_handler))
        .route("/support/upload/image", post(support_upload_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub support_index: &'static str,
    pub support_entries: usize,
    pub classes: Vec<String>,
    pub embedder_mode: &'static str,
    pub reasoning_backend: &'static str,
}

/// Liveness URL of a server on the local host.
pub fn health_check_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/ragvision/healthcheck", port)
}

/// GETs [`health_check_url`] and reports whether it answered 2xx within `timeout`.
///
/// Runs on the caller's runtime.
pub async fn check_health(port: u16, timeout: std::time::Duration) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };
    match client.get(health_check_url(port)).send().await {
        Ok(res) => res.status().is_success(),
        Err(e) => {
            tracing::debug!(port, error = %e, "Health check request failed");
            false
        }
    }
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        RAGVISION_STATUS_HEADER,
        HeaderValue::from_static(RAGVISION_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready once the support index holds at least one entry; inference needs evidence.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let service = &state.service;
    let support_entries = service.index().len();
    let support_index = if support_entries > 0 {
        RAGVISION_STATUS_READY
    } else {
        "empty"
    };

    let embedder_mode = if service.embedder_is_stub() {
        "stub"
    } else {
        "real"
    };

    let components = ComponentStatus {
        http: RAGVISION_STATUS_READY,
        support_index,
        support_entries,
        classes: service
            .labels()
            .iter()
            .map(|l| l.as_str().to_string())
            .collect(),
        embedder_mode,
        reasoning_backend: service.invoker_backend(),
    };

    let is_ready = components.support_index == RAGVISION_STATUS_READY;
    let (status_code, status_msg, header) = if is_ready {
        (StatusCode::OK, "ok", RAGVISION_STATUS_READY)
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "pending",
            RAGVISION_STATUS_NOT_READY,
        )
    };

    let mut headers = HeaderMap::new();
    headers.insert(RAGVISION_STATUS_HEADER, HeaderValue::from_static(header));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
