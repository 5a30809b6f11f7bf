//! Health and index statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.manager.stats();
    let (rag_enabled, llm_model) = {
        let bot = state.bot_config.read();
        (bot.rag_enabled, bot.llm_model().to_string())
    };

    Json(serde_json::json!({
        "status": "healthy",
        "service": "ragdb",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "busy": state.manager.is_busy(),
        "ragEnabled": rag_enabled,
        "llmModel": llm_model,
        "index": stats,
        "retrieval": {
            "kRetrieved": state.config.retrieval.k_retrieved,
            "kFinal": state.config.retrieval.k_final,
        },
    }))
}
