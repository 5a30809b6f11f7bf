//! HTTP route handlers under `/api`.

pub mod chat;
pub mod context;
pub mod datasets;
pub mod status;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use ragdb_core::Error;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(datasets::routes())
        .merge(context::routes())
        .merge(chat::routes())
}

/// HTTP status for a domain error.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::DuplicateSource(_) | Error::Busy | Error::IncompatibleIndex(_) => StatusCode::CONFLICT,
        Error::UnknownColumn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Config(_) | Error::Ingest(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        Error::EmptyDatabase => StatusCode::NOT_FOUND,
        Error::Generation(_) => StatusCode::BAD_GATEWAY,
        Error::Io(_) | Error::Storage(_) | Error::Inference(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// JSON error body: `{ "error": message }`, plus `available` for unknown
/// dataset columns.
pub fn error_response(err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    let body = match &err {
        Error::UnknownColumn { column, available } => json!({
            "error": err.to_string(),
            "column": column,
            "available": available,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, Json(body)).into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

/// Run blocking store or loader work off the async runtime.
pub async fn blocking<T, F>(f: F) -> ragdb_core::Result<T>
where
    F: FnOnce() -> ragdb_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::DuplicateSource("demo".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&Error::Busy), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::UnknownColumn {
                column: "body".into(),
                available: vec!["text".into()],
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(status_for(&Error::Io(missing)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::Generation("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&Error::Storage("bad header".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
