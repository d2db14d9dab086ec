//! Abstracción sobre Rig para los dos colaboradores externos del motor:
//! embeddings de consultas y generación de texto.
//!
//! El motor depende sólo de los traits `QueryEmbedder` y `TextGenerator`;
//! `LlmManager` los implementa con OpenAI vía Rig.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts

use crate::config::{AppConfig, LlmProvider};

/// Petición de generación con contexto de anclaje.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Pasajes recuperados y datos estructurados; lo único que puede citarse.
    pub context: String,
    pub prompt: String,
}

#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Nombre del modelo; debe coincidir con el usado al construir el índice.
    fn model_name(&self) -> &str;

    async fn embed_query(&self, text: &str) -> Result<Vec<f64>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Gestor de LLMs y embeddings.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración. Devuelve `None` si
    /// no hay clave de API: el servicio funciona sin explicaciones.
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        cfg.openai_api_key.as_ref()?;
        Some(Self {
            provider: cfg.llm_provider.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        })
    }

    async fn embed_with_openai(&self, text: &str) -> Result<Vec<f64>> {
        use rig::providers::openai::{self, TEXT_EMBEDDING_3_SMALL};
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let client = openai::Client::from_env();
        let model_name = if self.embedding_model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.embedding_model.as_str()
        };
        let embedding_model = client.embedding_model(model_name);

        let embeddings = embedding_model.embed_texts(vec![text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .map(|e| e.vec)
            .ok_or_else(|| anyhow!("No se pudo generar embedding de la query"))
    }

    async fn generate_with_openai(&self, request: &GenerationRequest) -> Result<String> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = openai::Client::from_env();
        let model_name = if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        };

        let agent = client
            .agent(model_name)
            .preamble(&request.system_prompt)
            .context(&request.context)
            .temperature(0.3)
            .build();

        let answer = agent.prompt(request.prompt.as_str()).await?;
        Ok(answer)
    }
}

#[async_trait]
impl QueryEmbedder for LlmManager {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
        match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(text).await,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmManager {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.generate_with_openai(request).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Colaboradores en memoria para tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Embedding determinista: cuenta apariciones de cada palabra clave.
    pub struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
    }

    #[async_trait]
    impl QueryEmbedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-test"
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
            let lower = text.to_lowercase();
            Ok(self
                .keywords
                .iter()
                .map(|k| lower.matches(k).count() as f64)
                .collect())
        }
    }

    pub struct FailingEmbedder;

    #[async_trait]
    impl QueryEmbedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f64>> {
            Err(anyhow!("embedding service down"))
        }
    }

    pub enum Behaviour {
        Echo,
        Fail,
        Hang,
    }

    /// Generador que registra las peticiones recibidas.
    pub struct ScriptedGenerator {
        pub behaviour: Behaviour,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<GenerationRequest>>,
        in_flight: AtomicUsize,
    }

    /// Cuenta una generación en curso mientras vive; al abandonar el futuro
    /// se descuenta.
    struct InFlight<'a>(&'a AtomicUsize);

    impl<'a> InFlight<'a> {
        fn enter(counter: &'a AtomicUsize) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(counter)
        }
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ScriptedGenerator {
        pub fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
            }
        }

        /// Generaciones empezadas y aún no terminadas ni abandonadas.
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match self.behaviour {
                Behaviour::Echo => Ok(format!("generated: {}", request.prompt.lines().next().unwrap_or(""))),
                Behaviour::Fail => Err(anyhow!("model overloaded")),
                Behaviour::Hang => {
                    let _guard = InFlight::enter(&self.in_flight);
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }
}
