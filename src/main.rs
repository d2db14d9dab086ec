// Módulos de la aplicación
mod acr;
mod api;
mod app_state;
mod config;
mod engine;
mod error;
mod eu_tirads;
mod llm;
mod models;
mod neo4j_client;
mod rag;
mod recommendation;
mod retriever;
mod size;
mod vector_store;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::engine::EvaluationEngine;
use crate::llm::{LlmManager, QueryEmbedder, TextGenerator};
use crate::rag::ExplanationComposer;
use crate::retriever::GuidelineRetriever;
use crate::vector_store::{GuidelineIndex, GuidelineTrack};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Cargar el índice de guías (una sola vez, inmutable)
    let index = load_index(&cfg).await?.map(Arc::new);
    if let Some(index) = &index {
        for track in GuidelineTrack::ALL {
            info!("Guía '{}': {} chunks indexados.", track.as_str(), index.count_for(track));
        }
    }

    // 4. Colaboradores externos (embeddings + generación)
    let llm_manager = LlmManager::from_config(&cfg).map(Arc::new);
    if llm_manager.is_none() {
        warn!("OPENAI_API_KEY no configurada: las explicaciones se degradarán al mensaje fijo.");
    }
    let embedder = llm_manager.clone().map(|m| m as Arc<dyn QueryEmbedder>);
    let generator = llm_manager.map(|m| m as Arc<dyn TextGenerator>);

    // 5. Motor de evaluación y estado compartido
    let retriever = GuidelineRetriever::new(
        index,
        embedder,
        cfg.retrieval_min_score,
        cfg.retrieval_top_k,
    );
    let composer = ExplanationComposer::new(
        generator,
        cfg.generation_timeout,
        cfg.explanation_language.clone(),
    );
    let app_state = AppState {
        config: Arc::new(cfg),
        engine: EvaluationEngine::new(retriever, composer),
    };

    // 6. Router de la API
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo abrir {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}

/// Origen del índice: snapshot JSON si está configurado; si no, Neo4j; si
/// no hay ninguno, el servicio arranca sin índice (health lo reporta).
async fn load_index(cfg: &AppConfig) -> Result<Option<GuidelineIndex>> {
    if let Some(path) = &cfg.guideline_index_path {
        return GuidelineIndex::load_snapshot(path).map(Some);
    }

    if let Some(neo4j) = &cfg.neo4j {
        let graph = neo4j_client::connect(neo4j)
            .await
            .context("Error conectando a Neo4j")?;
        let index = neo4j_client::load_guideline_index(&graph, cfg)
            .await
            .context("Error leyendo el índice de guías desde Neo4j")?;
        return Ok(Some(index));
    }

    warn!("Sin GUIDELINE_INDEX_PATH ni NEO4J_URI: el índice de guías no está cargado.");
    Ok(None)
}
