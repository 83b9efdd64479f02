//! REST surface: health, conversation lifecycle, pre-call audio preparation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::conversation::FieldSpec;
use crate::core::tts::{TTSConfig, create_tts_provider};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct LeadFieldSpec {
    pub field: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Generated when omitted
    pub conversation_id: Option<String>,
    pub callee_name: Option<String>,
    #[serde(default)]
    pub lead_fields: Vec<LeadFieldSpec>,
}

#[derive(Debug, Deserialize)]
pub struct PrepareAudioRequest {
    pub text: String,
    #[serde(default = "default_tts_service")]
    pub tts_service: String,
    #[serde(default)]
    pub voice_type: String,
}

fn default_tts_service() -> String {
    "deepgram".to_string()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Initialize conversation state before the media stream connects.
/// The media stream fails fast on ids that were never created here.
async fn create_conversation(
    State(app): State<Arc<AppState>>,
    Json(request): Json<CreateConversationRequest>,
) -> AppResult<Json<Value>> {
    let conversation_id = match &request.conversation_id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::BadRequest(
                "conversation_id must not be empty".to_string(),
            ));
        }
        Some(id) => id.clone(),
        None => uuid::Uuid::new_v4().to_string(),
    };

    let state = app.store.create(&conversation_id);
    {
        let mut guard = state.lock().await;
        if let Some(name) = &request.callee_name {
            guard.memory.set_context("calleeName", json!(name.clone()));
        }
        if !request.lead_fields.is_empty() {
            guard.configure_lead_goal(request.lead_fields.iter().map(|spec| {
                (
                    spec.field.clone(),
                    FieldSpec {
                        required: spec.required,
                        description: spec.description.clone(),
                    },
                )
            }));
        }
    }

    info!(conversation_id = %conversation_id, "Conversation created");
    Ok(Json(json!({
        "conversation_id": conversation_id,
        "active_conversations": app.store.len(),
    })))
}

async fn destroy_conversation(
    State(app): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> AppResult<Json<Value>> {
    if !app.store.destroy(&conversation_id) {
        return Err(AppError::NotFound(format!(
            "No conversation with id: {conversation_id}"
        )));
    }
    Ok(Json(json!({ "destroyed": conversation_id })))
}

/// Pre-synthesize a fixed phrase so the call's first utterance plays from
/// memory instead of waiting on a live TTS round trip
async fn prepare_audio(
    State(app): State<Arc<AppState>>,
    Json(request): Json<PrepareAudioRequest>,
) -> AppResult<Json<Value>> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let api_key = app
        .config
        .tts_api_key(&request.tts_service)
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "No API key configured for TTS provider: {}",
                request.tts_service
            ))
        })?
        .to_string();

    let tts = create_tts_provider(
        &request.tts_service,
        TTSConfig {
            provider: request.tts_service.clone(),
            api_key,
            voice_id: (!request.voice_type.is_empty()).then(|| request.voice_type.clone()),
            ..Default::default()
        },
    )
    .map_err(|e| AppError::Configuration(e.to_string()))?;

    let audio = app
        .audio_cache
        .prepare(
            tts.as_ref(),
            &request.tts_service,
            &request.voice_type,
            &request.text,
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(json!({ "cached": true, "bytes": audio.len() })))
}

/// Create the REST router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/{id}", delete(destroy_conversation))
        .route("/api/audio/prepare", post(prepare_audio))
        .layer(TraceLayer::new_for_http())
}
