//! Chat routes: retrieval-augmented answers, RAG toggle and bot config.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ragdb_chat::prompt::recent_history;
use ragdb_chat::text::{filter_mentions, remove_id, split_message};
use ragdb_chat::types::*;
use ragdb_chat::{OpenAiCompatGenerator, PromptTemplate};
use ragdb_runtime::AnsweredContext;
use tracing::{debug, info};

use super::{bad_request, blocking, error_response};
use crate::state::AppState;

/// Characters of each retrieved chunk echoed back as provenance.
const EXCERPT_CHARS: usize = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/rag/toggle", post(toggle_rag))
        .route("/config", get(get_config).put(update_config))
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let started = Instant::now();
    let message = remove_id(&req.message).trim().to_string();
    if message.is_empty() {
        return bad_request("Message is required");
    }

    let bot = state.bot_config.read().clone();
    let generator = state.generator();
    let use_rag = req.use_rag.unwrap_or(bot.rag_enabled);

    let answered = if use_rag {
        let manager = Arc::clone(&state.manager);
        let query = message.clone();
        match blocking(move || manager.retrieve(&query)).await {
            Ok(answered) => Some(answered),
            Err(e) => return error_response(e),
        }
    } else {
        None
    };

    let template = if use_rag {
        PromptTemplate::rag()
    } else {
        PromptTemplate::plain()
    };
    let context = answered.as_ref().map_or("", |a| a.context.as_str());
    let history = recent_history(&req.history, bot.history_lines);
    let messages = template.render(&bot.identity, &message, context, history);
    debug!("Prompting {} with {} messages (rag={})", generator.model(), messages.len(), use_rag);

    let answer = match generator.generate(&messages, bot.temperature).await {
        Ok(answer) => filter_mentions(&answer),
        Err(e) => return error_response(e),
    };

    Json(ChatResponse {
        parts: split_message(&answer),
        answer,
        model: generator.model().to_string(),
        used_rag: use_rag,
        sources: answered.as_ref().map(provenance).unwrap_or_default(),
        duration: started.elapsed().as_millis() as u64,
    })
    .into_response()
}

fn provenance(answered: &AnsweredContext) -> Vec<ChatContext> {
    answered
        .chunks
        .iter()
        .map(|scored| ChatContext {
            excerpt: scored.chunk.content.chars().take(EXCERPT_CHARS).collect(),
            distance: scored.distance,
            title: scored.chunk.metadata.title.clone(),
            source: scored.chunk.metadata.source.clone(),
        })
        .collect()
}

async fn toggle_rag(State(state): State<Arc<AppState>>) -> Response {
    let (enabled, saved) = {
        let mut bot = state.bot_config.write();
        let enabled = bot.toggle_rag();
        (enabled, bot.save())
    };
    match saved {
        Ok(()) => Json(serde_json::json!({ "ragEnabled": enabled })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<BotConfigResponse> {
    Json(state.bot_config.read().to_response())
}

async fn update_config(State(state): State<Arc<AppState>>, Json(update): Json<BotConfigUpdate>) -> Response {
    let endpoint_changed = update.llm_url.is_some() || update.llm_model.is_some() || update.llm_api_key.is_some();

    let (response, saved, generator) = {
        let mut bot = state.bot_config.write();
        bot.apply_update(&update);
        let generator = endpoint_changed.then(|| OpenAiCompatGenerator::from_config(&bot));
        (bot.to_response(), bot.save(), generator)
    };

    if let Some(generator) = generator {
        info!("Generation endpoint changed to {} ({})", response.llm_url, response.llm_model);
        state.replace_generator(Arc::new(generator));
    }

    match saved {
        Ok(()) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}
