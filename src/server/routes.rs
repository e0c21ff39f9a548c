//! HTTP handlers for the web form.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path as AxumPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::backend::{Device, ModelLoader};
use crate::engine::{DeviceSelection, GeneratedArtifact, Mode};
use crate::output::{ArtifactInfo, OutputError};

use super::AppState;
use super::form::FormData;
use super::page::INDEX_HTML;

/// Reply to a form submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub ok: bool,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl GenerateResponse {
    fn failure(status: String) -> Self {
        Self {
            ok: false,
            status,
            mode: None,
            duration_seconds: None,
            audio_url: None,
        }
    }

    fn success(artifact: &GeneratedArtifact) -> Self {
        let audio_url = artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| format!("/outputs/{n}"));

        Self {
            ok: true,
            status: artifact.status_message(),
            mode: Some(artifact.mode),
            duration_seconds: Some(artifact.duration_seconds),
            audio_url,
        }
    }
}

/// Model fields are omitted while a generation holds the handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub idle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
}

#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_device() -> String {
    "auto".to_string()
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Never waits on the handler lock; a busy handler reports `idle: false`.
pub async fn health<L: ModelLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> Json<HealthStatus> {
    let snapshot = state
        .handler
        .try_lock()
        .map(|handler| handler.loaded_device());

    Json(HealthStatus {
        status: "healthy".to_string(),
        idle: snapshot.is_some(),
        model_loaded: snapshot.map(|device| device.is_some()),
        device: snapshot.flatten(),
    })
}

pub async fn generate<L: ModelLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
    multipart: Multipart,
) -> Response {
    let request = match FormData::read(multipart).await.and_then(FormData::into_request) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(GenerateResponse::failure(format!("Error: {e}"))),
            )
                .into_response();
        }
    };

    let worker = Arc::clone(&state);
    let result =
        tokio::task::spawn_blocking(move || worker.handler.lock().generate(request)).await;

    match result {
        Ok(Ok(artifact)) => {
            (StatusCode::OK, Json(GenerateResponse::success(&artifact))).into_response()
        }
        Ok(Err(e)) => {
            let status = if e.is_validation() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(GenerateResponse::failure(e.status_message()))).into_response()
        }
        Err(e) => {
            error!(error = %e, "generation task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerateResponse::failure(format!(
                    "Error generating speech: {e}"
                ))),
            )
                .into_response()
        }
    }
}

pub async fn reload_model<L: ModelLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Json(request): Json<ReloadRequest>,
) -> Response {
    let selection = match request.device.parse::<DeviceSelection>() {
        Ok(selection) => selection,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || worker.handler.lock().reload(selection)).await;

    match result {
        Ok(Ok(device)) => Json(serde_json::json!({ "device": device })).into_response(),
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn list_outputs<L: ModelLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<Vec<ArtifactInfo>>, Response> {
    state
        .outputs
        .list()
        .map(Json)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn serve_output<L: ModelLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    let path = match state.outputs.resolve(&name) {
        Ok(path) => path,
        Err(e @ OutputError::InvalidName(_)) => {
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e @ OutputError::NotFound(_)) => {
            return error_response(StatusCode::NOT_FOUND, e.to_string());
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
