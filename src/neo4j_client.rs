//! Lectura del índice de guías persistido en Neo4j.
//!
//! Los nodos `(:Chunk)` se leen una sola vez al arrancar y se copian a un
//! `GuidelineIndex` en memoria; el servicio nunca escribe en Neo4j.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use tracing::{info, warn};
use url::Url;

use crate::config::{AppConfig, Neo4jConfig};
use crate::vector_store::{GuidelineIndex, GuidelineTrack, StoredChunk};

pub async fn connect(cfg: &Neo4jConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.user, &cfg.password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Carga todos los `(:Chunk)` en orden de ingesta y construye el índice.
///
/// El modelo de embeddings se toma del nodo `(:IndexMeta)` si existe; si no,
/// se asume el modelo configurado.
pub async fn load_guideline_index(graph: &Graph, cfg: &AppConfig) -> Result<GuidelineIndex> {
    let (embedding_model, built_at) = read_index_meta(graph)
        .await?
        .unwrap_or_else(|| (cfg.llm_embedding_model.clone(), None));

    let mut cursor = graph
        .execute(query(
            "MATCH (c:Chunk)
             RETURN c.track AS track, c.doc_id AS doc_id, c.page AS page,
                    c.chunk_id AS chunk_id, c.text AS text, c.embedding AS embedding
             ORDER BY coalesce(c.ingest_order, 0), c.chunk_id",
        ))
        .await?;

    let mut stored = Vec::new();
    while let Some(row) = cursor.next().await? {
        let chunk = ChunkRow {
            track: row.get("track"),
            doc_id: row.get("doc_id"),
            page: row.get("page"),
            chunk_id: row.get("chunk_id"),
            text: row.get("text"),
            embedding: row.get("embedding"),
        };
        stored.push(chunk.into_stored()?);
    }

    let index = GuidelineIndex::from_stored(embedding_model, built_at, stored)?;
    info!(
        "Índice de guías cargado desde Neo4j: {} chunks (modelo '{}').",
        index.len(),
        index.embedding_model()
    );
    Ok(index)
}

/// Campos de un `(:Chunk)` tal como llegan de Neo4j.
#[derive(Debug, Default)]
struct ChunkRow {
    track: Option<String>,
    doc_id: Option<String>,
    page: Option<i64>,
    chunk_id: Option<String>,
    text: Option<String>,
    embedding: Option<Vec<f64>>,
}

impl ChunkRow {
    /// La procedencia (documento y página) debe venir del índice: un chunk
    /// sin página válida es un error, no una página 0.
    fn into_stored(self) -> Result<StoredChunk> {
        let chunk_id = self
            .chunk_id
            .ok_or_else(|| anyhow!("Falta campo 'chunk_id' en resultado de Neo4j"))?;
        let doc_id = self
            .doc_id
            .ok_or_else(|| anyhow!("Falta campo 'doc_id' en el chunk {chunk_id}"))?;
        let raw_page = self
            .page
            .ok_or_else(|| anyhow!("Falta campo 'page' en el chunk {chunk_id}"))?;
        let page = u32::try_from(raw_page)
            .map_err(|_| anyhow!("Página inválida ({raw_page}) en el chunk {chunk_id}"))?;
        let text = self
            .text
            .ok_or_else(|| anyhow!("Falta campo 'text' en el chunk {chunk_id}"))?;
        let embedding = self
            .embedding
            .ok_or_else(|| anyhow!("Falta campo 'embedding' en el chunk {chunk_id}"))?;
        let track = self.track.and_then(|t| parse_track(&t, &chunk_id));

        Ok(StoredChunk {
            track,
            doc_id,
            page,
            chunk_id,
            text,
            embedding,
        })
    }
}

async fn read_index_meta(graph: &Graph) -> Result<Option<(String, Option<DateTime<Utc>>)>> {
    let mut cursor = graph
        .execute(query(
            "MATCH (m:IndexMeta) RETURN m.embedding_model AS model, m.built_at AS built_at LIMIT 1",
        ))
        .await?;

    let Some(row) = cursor.next().await? else {
        return Ok(None);
    };
    let Some(model) = row.get::<String>("model") else {
        return Ok(None);
    };
    let built_at = row
        .get::<String>("built_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Ok(Some((model, built_at)))
}

fn parse_track(raw: &str, chunk_id: &str) -> Option<GuidelineTrack> {
    match serde_json::from_value(serde_json::Value::String(raw.to_lowercase())) {
        Ok(track) => Some(track),
        Err(_) => {
            warn!("Guía desconocida '{raw}' en el chunk {chunk_id}; se deducirá del documento.");
            None
        }
    }
}
