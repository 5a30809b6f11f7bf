//! Context assembly for external generators.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::{bad_request, blocking, error_response};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/context", post(get_context))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextRequest {
    query: String,
    k_retrieved: Option<usize>,
    k_final: Option<usize>,
}

async fn get_context(State(state): State<Arc<AppState>>, Json(req): Json<ContextRequest>) -> Response {
    let defaults = state.config.retrieval;
    let k_retrieved = req.k_retrieved.unwrap_or(defaults.k_retrieved);
    let k_final = req.k_final.unwrap_or(defaults.k_final);
    if k_retrieved == 0 || k_final == 0 {
        return bad_request("kRetrieved and kFinal must be positive");
    }

    let manager = Arc::clone(&state.manager);
    match blocking(move || manager.answer_context(&req.query, k_retrieved, k_final)).await {
        Ok(answered) => Json(answered).into_response(),
        Err(e) => error_response(e),
    }
}
