use crate::engine::{EngineError, EngineHandle};
use crate::notifier::{AttendancePayload, NotificationOutcome, Notifier};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_core::{match_faces, DistanceMetric, Gallery, MatchPolicy};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

const IMAGE_FIELD: &str = "image";

/// Matching and upload settings fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub tolerance: f32,
    pub min_confidence: f64,
    pub match_policy: MatchPolicy,
    /// Reported by the embedding provider at startup.
    pub metric: DistanceMetric,
    pub max_upload_bytes: usize,
}

pub struct AppState {
    pub gallery: Arc<Gallery>,
    pub engine: EngineHandle,
    pub notifier: Notifier,
    pub settings: Settings,
}

pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.settings.max_upload_bytes;

    Router::new()
        .route("/compare-face", post(compare_face))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image uploaded")]
    NoImageUploaded,
    #[error("Face recognition error: Empty image data")]
    EmptyImage,
    #[error("No face detected in uploaded image")]
    NoFaceDetected,
    #[error("Image exceeds the upload limit of {0} bytes")]
    UploadTooLarge(usize),
    #[error("Error processing the image: {0}")]
    Processing(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Processing(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoImageUploaded
            | ApiError::EmptyImage
            | ApiError::NoFaceDetected => StatusCode::BAD_REQUEST,
            ApiError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Processing(_) => {
                tracing::error!(error = %self, "unexpected error processing upload");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(json!({"status": "error", "message": self.to_string()})),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub status: &'static str,
    pub message: String,
    pub name: Option<String>,
    pub confidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_status: Option<String>,
}

impl CompareResponse {
    fn not_found() -> Self {
        Self {
            status: "not_found",
            message: "No Match Found".into(),
            name: None,
            confidence: "0%".into(),
            node_response: None,
            node_status: None,
        }
    }

    fn matched(name: String, confidence: String) -> Self {
        Self {
            status: "success",
            message: format!("Match Found! Name: {name}"),
            name: Some(name),
            confidence,
            node_response: None,
            node_status: None,
        }
    }

    fn with_outcome(mut self, outcome: NotificationOutcome) -> Self {
        match outcome {
            NotificationOutcome::Delivered(body) if !is_empty_reply(&body) => {
                self.node_response = Some(body);
            }
            NotificationOutcome::PartialSuccess(code) => {
                self.node_response = Some(json!({
                    "status": "partial_success",
                    "message": "Data sent but Node.js returned non-200 status",
                    "node_status": code,
                }));
            }
            NotificationOutcome::Delivered(_) | NotificationOutcome::Failed => {
                self.node_status = Some("Data sent but no response from Node.js".into());
            }
        }
        self
    }

    fn below_threshold(mut self) -> Self {
        self.message = format!("Match found but confidence too low ({})", self.confidence);
        self.node_status = Some("Data not sent due to low confidence".into());
        self
    }
}

/// A 200 reply with nothing in it is reported like no reply at all.
fn is_empty_reply(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn format_confidence(confidence: f64) -> String {
    format!("{confidence:.2}%")
}

/// A body over the limit is the client's fault; any other read failure is not.
fn upload_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::UploadTooLarge(limit);
    }
    ApiError::Processing(err.body_text())
}

/// Read the `image` file part, skipping any other fields.
/// A plain form field named `image` is not a file and does not count.
async fn read_image_field(
    mut multipart: Multipart,
    limit: usize,
) -> Result<Option<Vec<u8>>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| upload_error(err, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|err| upload_error(err, limit))?;
        tracing::debug!(bytes = bytes.len(), content_type = ?content_type, "image received");
        return Ok(Some(bytes.to_vec()));
    }
    Ok(None)
}

async fn compare_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let settings = &state.settings;
    let multipart = multipart.map_err(|_| ApiError::NoImageUploaded)?;
    let image = read_image_field(multipart, settings.max_upload_bytes)
        .await?
        .ok_or(ApiError::NoImageUploaded)?;

    if image.is_empty() {
        return Err(ApiError::EmptyImage);
    }

    let embeddings = state.engine.embed(image).await?;
    if embeddings.is_empty() {
        return Err(ApiError::NoFaceDetected);
    }

    let matcher = settings.match_policy.matcher(settings.metric);
    let result = match_faces(
        matcher.as_ref(),
        &embeddings,
        &state.gallery,
        settings.tolerance,
    );

    let Some(name) = result.name.filter(|_| result.matched) else {
        tracing::info!(faces = embeddings.len(), "no match found");
        return Ok(Json(CompareResponse::not_found()));
    };

    let confidence = format_confidence(result.confidence);
    tracing::info!(name = %name, confidence = %confidence, "match found");

    let response = CompareResponse::matched(name.clone(), confidence.clone());
    if result.confidence < settings.min_confidence {
        return Ok(Json(response.below_threshold()));
    }

    let outcome = state
        .notifier
        .notify(&AttendancePayload { name, confidence })
        .await;
    Ok(Json(response.with_outcome(outcome)))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "gallery_size": state.gallery.len(),
        "tolerance": state.settings.tolerance,
        "min_confidence": state.settings.min_confidence,
        "match_policy": state.settings.match_policy.to_string(),
        "metric": state.settings.metric.to_string(),
    }))
}
