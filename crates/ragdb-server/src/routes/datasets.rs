//! Dataset routes: manifest listing, ingestion, uploads and wipe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ragdb_core::Error;
use ragdb_ingest::{load_dataset, load_text_file, LoadedSource, DEFAULT_COLUMN};
use serde::Deserialize;
use tracing::{info, warn};

use super::{bad_request, blocking, error_response};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/datasets",
            get(list_datasets).post(add_dataset).delete(wipe_datasets),
        )
        .route("/files", post(upload_file))
}

async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.manager.list_sources()))
}

#[derive(Deserialize)]
struct AddDatasetRequest {
    name: String,
    path: PathBuf,
    column: Option<String>,
}

async fn add_dataset(State(state): State<Arc<AppState>>, Json(req): Json<AddDatasetRequest>) -> Response {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return bad_request("Dataset name is required");
    }
    if let Err(e) = precheck(&state, &name) {
        return error_response(e);
    }

    let column = req.column.unwrap_or_else(|| DEFAULT_COLUMN.to_string());
    let path = req.path;
    info!("Loading dataset '{}' from {} (column '{}')", name, path.display(), column);
    let loaded = match blocking(move || load_dataset(&path, &column)).await {
        Ok(loaded) => loaded,
        Err(e) => return error_response(e),
    };

    ingest(&state, name, loaded).await
}

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    content: String,
}

/// Store raw text under the uploads directory and ingest it as one document.
async fn upload_file(State(state): State<Arc<AppState>>, Json(req): Json<UploadRequest>) -> Response {
    let Some(file_name) = Path::new(req.name.trim()).file_name().map(|n| n.to_os_string()) else {
        return bad_request("A file name is required");
    };
    let name = file_name.to_string_lossy().into_owned();
    if let Err(e) = precheck(&state, &name) {
        return error_response(e);
    }

    let path = state.config.data_paths.uploads.join(&file_name);
    let content = req.content;
    let loaded = blocking(move || {
        std::fs::write(&path, content)?;
        let loaded = load_text_file(&path);
        if loaded.is_err() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove rejected upload {}: {}", path.display(), e);
            }
        }
        loaded
    })
    .await;

    match loaded {
        Ok(loaded) => ingest(&state, name, loaded).await,
        Err(e) => error_response(e),
    }
}

async fn wipe_datasets(State(state): State<Arc<AppState>>) -> Response {
    match state.manager.wipe_in_background().await {
        Ok(report) if report.is_clean() => (StatusCode::OK, Json(report)).into_response(),
        Ok(report) => (StatusCode::INTERNAL_SERVER_ERROR, Json(report)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Reject known sources and concurrent mutations before loading anything.
fn precheck(state: &AppState, name: &str) -> ragdb_core::Result<()> {
    if state.manager.is_known_source(name) {
        return Err(Error::DuplicateSource(name.to_string()));
    }
    if state.manager.is_busy() {
        return Err(Error::Busy);
    }
    Ok(())
}

async fn ingest(state: &AppState, name: String, loaded: LoadedSource) -> Response {
    match state
        .manager
        .ingest_in_background(name, loaded.size_bytes, loaded.documents)
        .await
    {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => error_response(e),
    }
}
