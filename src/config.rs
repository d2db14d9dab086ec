//! Carga y gestión de configuración de la aplicación (índice de guías + LLM).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum LlmProvider {
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Conexión opcional a Neo4j como origen del índice de guías.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    /// `None` si `OPENAI_API_KEY` no está definido: sin embeddings ni generación.
    pub openai_api_key: Option<String>,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,

    pub guideline_index_path: Option<PathBuf>,
    pub neo4j: Option<Neo4jConfig>,

    pub retrieval_min_score: f64,
    pub retrieval_top_k: Option<usize>,
    pub generation_timeout: Duration,
    pub explanation_language: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo las variables de `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_addr = var("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string());

        let llm_provider =
            LlmProvider::from_str(&var("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string()))?;
        let openai_api_key = var("OPENAI_API_KEY");
        let llm_embedding_model =
            var("LLM_EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string());
        let llm_chat_model = var("LLM_CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let guideline_index_path = var("GUIDELINE_INDEX_PATH").map(PathBuf::from);

        let neo4j = match var("NEO4J_URI") {
            Some(uri) => Some(Neo4jConfig {
                uri,
                user: var("NEO4J_USER").ok_or_else(|| anyhow!("Falta NEO4J_USER en el entorno"))?,
                password: var("NEO4J_PASSWORD")
                    .ok_or_else(|| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            }),
            None => None,
        };

        let retrieval_min_score = match var("RETRIEVAL_MIN_SCORE") {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| anyhow!("RETRIEVAL_MIN_SCORE inválido: {raw}"))?,
            None => 0.5,
        };
        if !(-1.0..=1.0).contains(&retrieval_min_score) {
            return Err(anyhow!("RETRIEVAL_MIN_SCORE debe estar entre -1 y 1"));
        }

        let retrieval_top_k = match var("RETRIEVAL_TOP_K") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(k) if k > 0 => Some(k),
                _ => return Err(anyhow!("RETRIEVAL_TOP_K inválido: {raw}")),
            },
            None => None,
        };

        let generation_timeout = match var("GENERATION_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(anyhow!("GENERATION_TIMEOUT_SECS inválido: {raw}")),
            },
            None => Duration::from_secs(30),
        };

        let explanation_language =
            var("EXPLANATION_LANGUAGE").unwrap_or_else(|| "Turkish".to_string());

        Ok(Self {
            server_addr,
            llm_provider,
            openai_api_key,
            llm_embedding_model,
            llm_chat_model,
            guideline_index_path,
            neo4j,
            retrieval_min_score,
            retrieval_top_k,
            generation_timeout,
            explanation_language,
        })
    }
}
