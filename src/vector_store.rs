//! Índice vectorial de pasajes (chunks) de las guías clínicas.
//!
//! El índice se construye fuera de línea y se carga una sola vez al arrancar
//! (desde un snapshot JSON o desde Neo4j). Tras la carga es inmutable y se
//! comparte en solo-lectura entre todas las peticiones mediante `Arc`.
//!
//! API pública:
//!   - `GuidelineIndex::from_chunks(...)` / `GuidelineIndex::load_snapshot(path)`
//!   - `GuidelineIndex::search(track, &query_vec, top_k, min_score)`

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RetrievalError;

/// Guía clínica a la que pertenece un documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidelineTrack {
    /// Guía nacional (Türkiye).
    National,
    /// ACR TI-RADS (EE. UU.).
    Us,
    /// EU-TIRADS (Europa).
    Eu,
}

impl GuidelineTrack {
    pub const ALL: [GuidelineTrack; 3] = [Self::National, Self::Us, Self::Eu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::National => "national",
            Self::Us => "us",
            Self::Eu => "eu",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::National => "Turkish national thyroid nodule guideline",
            Self::Us => "ACR TI-RADS (US) guideline",
            Self::Eu => "EU-TIRADS (European) guideline",
        }
    }

    pub fn default_top_k(&self) -> usize {
        match self {
            Self::National => 5,
            Self::Us | Self::Eu => 3,
        }
    }

    /// Deduce la guía a partir del identificador del documento, para índices
    /// antiguos cuyos chunks no llevan la guía explícita.
    pub fn infer_from_doc_id(doc_id: &str) -> Option<Self> {
        let id = doc_id.to_lowercase();
        if id.contains("turkey") || id.starts_with("tr_") {
            Some(Self::National)
        } else if id.contains("acr") || id.contains("america") {
            Some(Self::Us)
        } else if id.contains("europe") || id.contains("eu") {
            Some(Self::Eu)
        } else {
            None
        }
    }
}

/// Entrada del snapshot persistido. `track` puede faltar en índices antiguos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    #[serde(default)]
    pub track: Option<GuidelineTrack>,
    pub doc_id: String,
    pub page: u32,
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f64>,
}

/// Chunk ya normalizado y asignado a una guía.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineChunk {
    pub track: GuidelineTrack,
    pub doc_id: String,
    pub page: u32,
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f64>,
    norm: f64,
}

impl GuidelineChunk {
    pub fn new(
        track: GuidelineTrack,
        doc_id: impl Into<String>,
        page: u32,
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f64>,
    ) -> Self {
        let norm = l2_norm(&embedding);
        Self {
            track,
            doc_id: doc_id.into(),
            page,
            chunk_id: chunk_id.into(),
            text: text.into(),
            embedding,
            norm,
        }
    }
}

/// Formato del snapshot JSON del índice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub embedding_model: String,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
    pub chunks: Vec<StoredChunk>,
}

/// Resultado de una búsqueda: similitud coseno y el chunk encontrado.
#[derive(Debug, Clone)]
pub struct ScoredChunk<'a> {
    pub score: f64,
    pub chunk: &'a GuidelineChunk,
}

#[derive(Debug)]
pub struct GuidelineIndex {
    embedding_model: String,
    built_at: Option<DateTime<Utc>>,
    dimension: usize,
    // Orden de ingesta; se usa para desempatar.
    chunks: Vec<GuidelineChunk>,
}

impl GuidelineIndex {
    /// Construye el índice a partir de chunks en orden de ingesta.
    /// Todos los embeddings deben tener la misma dimensión.
    pub fn from_chunks(
        embedding_model: impl Into<String>,
        built_at: Option<DateTime<Utc>>,
        chunks: Vec<GuidelineChunk>,
    ) -> Result<Self> {
        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            return Err(anyhow!(
                "El chunk '{}' tiene dimensión {} y se esperaba {}",
                bad.chunk_id,
                bad.embedding.len(),
                dimension
            ));
        }

        Ok(Self {
            embedding_model: embedding_model.into(),
            built_at,
            dimension,
            chunks,
        })
    }

    /// Convierte entradas persistidas, asignando la guía por `doc_id` cuando
    /// falta. Los chunks sin guía identificable se descartan con un aviso.
    pub fn from_stored(
        embedding_model: impl Into<String>,
        built_at: Option<DateTime<Utc>>,
        stored: Vec<StoredChunk>,
    ) -> Result<Self> {
        let mut chunks = Vec::with_capacity(stored.len());
        for entry in stored {
            let track = match entry.track.or_else(|| GuidelineTrack::infer_from_doc_id(&entry.doc_id)) {
                Some(track) => track,
                None => {
                    warn!(
                        "Chunk '{}' del documento '{}' sin guía identificable; se omite.",
                        entry.chunk_id, entry.doc_id
                    );
                    continue;
                }
            };
            chunks.push(GuidelineChunk::new(
                track,
                entry.doc_id,
                entry.page,
                entry.chunk_id,
                entry.text,
                entry.embedding,
            ));
        }
        Self::from_chunks(embedding_model, built_at, chunks)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer el índice {}", path.display()))?;
        let snapshot: IndexSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Snapshot de índice inválido en {}", path.display()))?;

        let index = Self::from_stored(snapshot.embedding_model, snapshot.built_at, snapshot.chunks)?;
        info!(
            "Índice de guías cargado desde {}: {} chunks (modelo '{}', dimensión {}).",
            path.display(),
            index.len(),
            index.embedding_model,
            index.dimension
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn count_for(&self, track: GuidelineTrack) -> usize {
        self.chunks.iter().filter(|c| c.track == track).count()
    }

    /// Búsqueda por similitud coseno restringida a una guía. Devuelve como
    /// máximo `top_k` chunks con `score >= min_score`, ordenados por score
    /// descendente; los empates conservan el orden de ingesta.
    pub fn search(
        &self,
        track: GuidelineTrack,
        query: &[f64],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredChunk<'_>>, RetrievalError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                query: query.len(),
                index: self.dimension,
            });
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .filter(|c| c.track == track)
            .map(|chunk| ScoredChunk {
                score: cosine(query, query_norm, &chunk.embedding, chunk.norm),
                chunk,
            })
            .filter(|s| s.score >= min_score)
            .collect();

        // sort_by es estable: a igual score se mantiene el orden de ingesta.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn cosine(a: &[f64], a_norm: f64, b: &[f64], b_norm: f64) -> f64 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
