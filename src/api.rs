use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::{
    app_state::AppState,
    engine::EvaluationResponse,
    error::ValidationError,
    models::EvaluationRequest,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    vectorstore_ready: bool,
    vectorstore_count: usize,
    embedding_model: Option<String>,
    index_built_at: Option<DateTime<Utc>>,
    llm_configured: bool,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/health/", get(health_handler))
        .route("/api/nodule/evaluate", post(evaluate_handler))
        .route("/api/nodule/evaluate/", post(evaluate_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let index = state.engine.retriever().index();
    Json(HealthResponse {
        status: "healthy",
        vectorstore_ready: index.map(|i| !i.is_empty()).unwrap_or(false),
        vectorstore_count: index.map(|i| i.len()).unwrap_or(0),
        embedding_model: index.map(|i| i.embedding_model().to_string()),
        index_built_at: index.and_then(|i| i.built_at()),
        llm_configured: state.config.openai_api_key.is_some(),
    })
}

#[axum::debug_handler]
async fn evaluate_handler(
    State(state): State<AppState>,
    payload: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Petición de evaluación rechazada: {}", rejection.body_text());
        validation_error(&ValidationError::new("body", rejection.body_text()))
    })?;

    if let Err(err) = request.validate() {
        warn!("Petición de evaluación inválida: {err}");
        return Err(validation_error(&err));
    }

    state
        .engine
        .evaluate(request)
        .await
        .map(Json)
        .map_err(|err| validation_error(&err))
}

fn validation_error(err: &ValidationError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": err.message, "field": err.field })),
    )
}
