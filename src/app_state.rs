use std::sync::Arc;

use crate::{config::AppConfig, engine::EvaluationEngine};

/// Estado compartido. Todo es de sólo lectura tras el arranque: el índice
/// de guías vive dentro del motor como `Arc<GuidelineIndex>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: EvaluationEngine,
}
