use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, instrument};

use super::error::GatewayError;
use super::payload::{
    InvocationRequest, InvocationResponse, SupportUploadRequest, SupportUploadResponse,
};
use super::state::HandlerState;
use super::status::{RAGVISION_STATUS_HEADER, RagVisionStatus};
use crate::patch::SourceImage;
use crate::pipeline::PipelineError;

/// `Json` whose rejections render as [`GatewayError`], status header included.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

pub async fn not_found_handler(uri: Uri) -> GatewayError {
    GatewayError::NotFound(uri.path().to_string())
}

pub async fn method_not_allowed_handler(method: Method, uri: Uri) -> GatewayError {
    GatewayError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

#[instrument(skip(state, request), fields(request_id = tracing::field::Empty))]
pub async fn invocations_handler(
    State(state): State<HandlerState>,
    ApiJson(mut request): ApiJson<InvocationRequest>,
) -> Result<Response, GatewayError> {
    let image = decode_image(std::mem::take(&mut request.encoded_image)).await?;
    let inference = request.into_inference(image, state.service.settings());

    let result = state.service.run_inference(inference).await?;
    tracing::Span::current().record("request_id", tracing::field::display(&result.request_id));

    let status = if result.decision.is_recognized() {
        RagVisionStatus::FlagRecognized
    } else {
        RagVisionStatus::FlagDefault
    };

    Ok(json_response(status, InvocationResponse::from(result)))
}

/// Stores one support image.
///
/// The image is embedded and written to disk before the index changes, so a failure
/// at any step leaves the served support set as it was. `index == 0` swaps the whole
/// set for this image.
#[instrument(skip(state, request), fields(class = %request.class_name, index = request.index))]
pub async fn support_upload_handler(
    State(state): State<HandlerState>,
    ApiJson(request): ApiJson<SupportUploadRequest>,
) -> Result<Response, GatewayError> {
    let classes = validate_classes(&state, &request)?;
    let class_name = request.class_name.trim().to_string();
    let image = decode_image(request.encoded_image).await?;

    let staged = state
        .service
        .stage_support_image(&class_name, image.clone())
        .await?;

    let reset = request.index == 0;
    let filename = match &state.support_root {
        Some(root) => {
            let prune = if reset { classes } else { Vec::new() };
            Some(
                persist_support_image(
                    root.clone(),
                    class_name.clone(),
                    request.index,
                    image,
                    prune,
                )
                .await?,
            )
        }
        None => None,
    };

    let ingest = state.service.commit_support(staged, reset)?;

    info!(
        patches = ingest.patches,
        replaced = ingest.replaced,
        total_entries = state.service.index().len(),
        "Support image stored"
    );

    let status = if reset {
        RagVisionStatus::SupportReset
    } else {
        RagVisionStatus::SupportStored
    };

    Ok(json_response(
        status,
        SupportUploadResponse {
            success: true,
            class_name,
            index: request.index,
            patches: ingest.patches,
            inserted: ingest.inserted,
            replaced: ingest.replaced,
            total_entries: state.service.index().len(),
            filename,
        },
    ))
}

pub(crate) fn json_response<T: serde::Serialize>(status: RagVisionStatus, body: T) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        RAGVISION_STATUS_HEADER,
        HeaderValue::from_static(status.as_header_value()),
    );
    (StatusCode::OK, headers, Json(body)).into_response()
}

/// `classes` must be non-empty, known to the service, and contain `class_name`.
pub(crate) fn validate_classes(
    state: &HandlerState,
    request: &SupportUploadRequest,
) -> Result<Vec<String>, GatewayError> {
    if request.classes.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "classes must not be empty".to_string(),
        ));
    }

    let labels = state.service.labels();
    let mut classes = Vec::with_capacity(request.classes.len());
    for class in &request.classes {
        let label = labels.get(class.trim()).map_err(PipelineError::from)?;
        classes.push(label.as_str().to_string());
    }

    if !classes.iter().any(|c| c == request.class_name.trim()) {
        return Err(GatewayError::InvalidRequest(format!(
            "className '{}' is not listed in classes",
            request.class_name
        )));
    }

    Ok(classes)
}

async fn decode_image(encoded: String) -> Result<SourceImage, GatewayError> {
    let image = tokio::task::spawn_blocking(move || SourceImage::from_base64(&encoded))
        .await
        .map_err(|e| GatewayError::InternalError(format!("decode task failed: {}", e)))?
        .map_err(PipelineError::from)?;
    debug!(width = image.width(), height = image.height(), "Image decoded");
    Ok(image)
}

/// Writes `<root>/<class>/<class>_<index>.png` and returns the file name.
///
/// The image goes to a hidden staging file first. Every directory named in `prune`
/// is then emptied of everything else, and the staging file is renamed into place.
async fn persist_support_image(
    root: PathBuf,
    class: String,
    index: u32,
    image: SourceImage,
    prune: Vec<String>,
) -> Result<String, GatewayError> {
    tokio::task::spawn_blocking(move || -> Result<String, GatewayError> {
        let dir = root.join(&class);
        std::fs::create_dir_all(&dir).map_err(|e| storage_error(&dir, e))?;

        let filename = support_filename(&class, index);
        let staging = dir.join(format!(".{}.tmp", filename));
        image
            .pixels()
            .save_with_format(&staging, image::ImageFormat::Png)
            .map_err(|e| storage_error(&staging, e))?;

        let placed = prune
            .iter()
            .try_for_each(|name| prune_dir(&root.join(name), &staging))
            .and_then(|()| {
                let path = dir.join(&filename);
                std::fs::rename(&staging, &path).map_err(|e| storage_error(&path, e))
            });
        if placed.is_err() {
            let _ = std::fs::remove_file(&staging);
        }
        placed.map(|()| filename)
    })
    .await
    .map_err(|e| GatewayError::InternalError(format!("storage task failed: {}", e)))?
}

/// Removes every entry of `dir` except `keep`, creating `dir` if missing.
fn prune_dir(dir: &Path, keep: &Path) -> Result<(), GatewayError> {
    if !dir.exists() {
        return std::fs::create_dir_all(dir).map_err(|e| storage_error(dir, e));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| storage_error(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| storage_error(dir, e))?.path();
        if path == keep {
            continue;
        }
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|e| storage_error(&path, e))?;
    }
    Ok(())
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::StorageError(format!("{}: {}", path.display(), err))
}

pub(crate) fn support_filename(class: &str, index: u32) -> String {
    format!("{}_{}.png", class, index)
}
