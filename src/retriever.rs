//! Recuperación de pasajes de guías por similitud semántica.
//!
//! Flujo por guía:
//!   1. Se construye la consulta serializando los hallazgos y la
//!      clasificación relevante para esa guía.
//!   2. Se calcula su embedding con el mismo modelo que construyó el índice.
//!   3. Búsqueda coseno sobre los chunks de esa guía y top-k.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::acr::TrLevel;
use crate::error::RetrievalError;
use crate::eu_tirads::EuResult;
use crate::llm::QueryEmbedder;
use crate::models::Findings;
use crate::recommendation::Action;
use crate::vector_store::{GuidelineIndex, GuidelineTrack};

const EXCERPT_CHARS: usize = 200;

/// Pasaje recuperado, con su procedencia tal como está en el índice.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub track: GuidelineTrack,
    pub doc_id: String,
    pub page: u32,
    pub chunk_id: String,
    pub content: String,
    pub excerpt: String,
    pub score: f64,
}

/// Datos de la evaluación que alimentan las consultas de recuperación.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub findings: &'a Findings,
    pub tr_level: TrLevel,
    pub eu: &'a EuResult,
    pub action: Action,
}

/// Consulta específica de cada guía. El orden de las partes es fijo, de modo
/// que la misma evaluación produce siempre la misma consulta.
pub fn build_query(track: GuidelineTrack, ctx: &QueryContext<'_>) -> String {
    let mut parts = vec![format!("Thyroid nodule evaluation. {}", ctx.findings.describe())];

    match track {
        GuidelineTrack::National => {
            parts.push(format!("Turkish guideline management of TI-RADS {} nodule", ctx.tr_level));
        }
        GuidelineTrack::Us => {
            parts.push(format!(
                "ACR TI-RADS classification: {} ({})",
                ctx.tr_level,
                ctx.tr_level.description()
            ));
        }
        GuidelineTrack::Eu => {
            parts.push(format!(
                "{} {} malignancy risk {}",
                ctx.eu.eu_level, ctx.eu.risk_category, ctx.eu.malignancy_risk
            ));
            if !ctx.eu.high_suspicious_features.is_empty() {
                parts.push(format!(
                    "High suspicion features: {}",
                    ctx.eu.high_suspicious_features.join(", ")
                ));
            }
        }
    }

    parts.push(ctx.action.query_terms().to_string());
    parts.join(". ")
}

/// Extracto para mostrar: primeros 200 caracteres (+ "..." si se corta).
pub fn excerpt_of(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Clone)]
pub struct GuidelineRetriever {
    index: Option<Arc<GuidelineIndex>>,
    embedder: Option<Arc<dyn QueryEmbedder>>,
    min_score: f64,
    top_k_override: Option<usize>,
}

impl GuidelineRetriever {
    pub fn new(
        index: Option<Arc<GuidelineIndex>>,
        embedder: Option<Arc<dyn QueryEmbedder>>,
        min_score: f64,
        top_k_override: Option<usize>,
    ) -> Self {
        if let (Some(index), Some(embedder)) = (&index, &embedder) {
            if index.embedding_model() != embedder.model_name() {
                warn!(
                    "El índice se construyó con '{}' pero las consultas usan '{}'; la similitud no será fiable.",
                    index.embedding_model(),
                    embedder.model_name()
                );
            }
        }
        Self {
            index,
            embedder,
            min_score,
            top_k_override,
        }
    }

    pub fn index(&self) -> Option<&Arc<GuidelineIndex>> {
        self.index.as_ref()
    }

    pub fn top_k(&self, track: GuidelineTrack) -> usize {
        self.top_k_override.unwrap_or_else(|| track.default_top_k())
    }

    pub async fn retrieve(
        &self,
        track: GuidelineTrack,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let (Some(index), Some(embedder)) = (&self.index, &self.embedder) else {
            return Err(RetrievalError::Unavailable);
        };

        let query_vec = embedder
            .embed_query(query)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let hits = index.search(track, &query_vec, self.top_k(track), self.min_score)?;
        debug!(track = track.as_str(), hits = hits.len(), "Pasajes recuperados");

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                track,
                doc_id: hit.chunk.doc_id.clone(),
                page: hit.chunk.page,
                chunk_id: hit.chunk.chunk_id.clone(),
                content: hit.chunk.text.clone(),
                excerpt: excerpt_of(&hit.chunk.text),
                score: hit.score,
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::acr::calculate_acr_tirads;
    use crate::eu_tirads::classify_eu_tirads;
    use crate::llm::fakes::{FailingEmbedder, KeywordEmbedder};
    use crate::models::{EchogenicFoci, Margin, Shape};
    use crate::vector_store::GuidelineChunk;
    use proptest::prelude::*;

    pub(crate) const KEYWORDS: [&str; 4] = ["fna", "follow-up", "benign", "tirads"];

    pub(crate) fn keyword_embedder() -> Arc<dyn QueryEmbedder> {
        Arc::new(KeywordEmbedder { keywords: KEYWORDS.to_vec() })
    }

    /// Índice pequeño con dimensiones [fna, follow-up, benign, tirads].
    pub(crate) fn test_index() -> Arc<GuidelineIndex> {
        let c = |track, doc: &str, page, id: &str, text: &str, v: [f64; 4]| {
            GuidelineChunk::new(track, doc, page, id, text, v.to_vec())
        };
        Arc::new(
            GuidelineIndex::from_chunks(
                "keyword-test",
                None,
                vec![
                    c(GuidelineTrack::National, "turkey.pdf", 12, "turkey_12_00", "FNA is indicated for TR5 nodules of 10 mm or more.", [1.0, 0.0, 0.0, 1.0]),
                    c(GuidelineTrack::National, "turkey.pdf", 13, "turkey_13_00", "Follow-up ultrasound in 1-2 years.", [0.0, 1.0, 0.0, 1.0]),
                    c(GuidelineTrack::Us, "america.pdf", 3, "america_3_00", "TR5 highly suspicious: FNA if >= 1 cm.", [1.0, 0.0, 0.0, 1.0]),
                    c(GuidelineTrack::Us, "america.pdf", 4, "america_4_00", "TR1 benign: no FNA.", [0.0, 0.0, 1.0, 1.0]),
                    c(GuidelineTrack::Eu, "europe.pdf", 7, "europe_7_00", "EU-TIRADS 5 high risk nodules warrant FNA. ".repeat(8).as_str(), [1.0, 0.0, 0.0, 1.0]),
                ],
            )
            .unwrap(),
        )
    }

    fn suspicious_findings() -> Findings {
        Findings {
            shape: Shape::TallerThanWide,
            margin: Margin::Irregular,
            echogenic_foci: EchogenicFoci::Microcalcifications,
            ..Default::default()
        }
    }

    fn query_for(track: GuidelineTrack, findings: &Findings) -> String {
        let acr = calculate_acr_tirads(findings);
        let eu = classify_eu_tirads(findings);
        build_query(
            track,
            &QueryContext { findings, tr_level: acr.tr_level, eu: &eu, action: Action::Fna },
        )
    }

    #[test]
    fn eu_query_carries_escalation_features() {
        let q = query_for(GuidelineTrack::Eu, &suspicious_findings());
        assert!(q.contains("EU-TIRADS 5"));
        assert!(q.contains("Taller-than-wide shape, Irregular margin, Microcalcifications"));
        let us = query_for(GuidelineTrack::Us, &suspicious_findings());
        assert!(us.contains("ACR TI-RADS classification: TR5"));
        assert!(!us.contains("High suspicion features"));
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let text = "ş".repeat(250);
        let excerpt = excerpt_of(&text);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt_of("short"), "short");
    }

    #[tokio::test]
    async fn retrieves_only_chunks_of_the_requested_track() {
        let retriever = GuidelineRetriever::new(Some(test_index()), Some(keyword_embedder()), 0.5, None);
        let query = query_for(GuidelineTrack::Us, &suspicious_findings());
        let chunks = retriever.retrieve(GuidelineTrack::Us, &query).await.unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.doc_id == "america.pdf" && c.track == GuidelineTrack::Us));
        assert_eq!(chunks[0].chunk_id, "america_3_00");
        assert_eq!(chunks[0].page, 3);
    }

    #[tokio::test]
    async fn long_chunks_get_a_truncated_excerpt_but_full_content() {
        let retriever = GuidelineRetriever::new(Some(test_index()), Some(keyword_embedder()), 0.0, None);
        let chunks = retriever.retrieve(GuidelineTrack::Eu, "fna tirads").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].excerpt.ends_with("..."));
        assert!(chunks[0].content.len() > chunks[0].excerpt.len());
    }

    #[tokio::test]
    async fn missing_index_is_unavailable() {
        let retriever = GuidelineRetriever::new(None, Some(keyword_embedder()), 0.5, None);
        let err = retriever.retrieve(GuidelineTrack::Us, "fna").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unavailable));

        let no_embedder = GuidelineRetriever::new(Some(test_index()), None, 0.5, None);
        assert!(matches!(
            no_embedder.retrieve(GuidelineTrack::Us, "fna").await.unwrap_err(),
            RetrievalError::Unavailable
        ));
    }

    #[tokio::test]
    async fn embedding_failure_is_reported() {
        let retriever = GuidelineRetriever::new(Some(test_index()), Some(Arc::new(FailingEmbedder)), 0.5, None);
        let err = retriever.retrieve(GuidelineTrack::Us, "fna").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }

    #[test]
    fn top_k_defaults_per_track_and_override() {
        let retriever = GuidelineRetriever::new(None, None, 0.5, None);
        assert_eq!(retriever.top_k(GuidelineTrack::National), 5);
        assert_eq!(retriever.top_k(GuidelineTrack::Eu), 3);
        let overridden = GuidelineRetriever::new(None, None, 0.5, Some(2));
        assert_eq!(overridden.top_k(GuidelineTrack::National), 2);
    }

    proptest! {
        #[test]
        fn retrieval_is_deterministic(query in "(fna|follow-up|benign|tirads| ){1,12}", track_idx in 0usize..3) {
            let track = GuidelineTrack::ALL[track_idx];
            let retriever = GuidelineRetriever::new(Some(test_index()), Some(keyword_embedder()), 0.0, None);
            let first = tokio_test::block_on(retriever.retrieve(track, &query)).unwrap();
            let second = tokio_test::block_on(retriever.retrieve(track, &query)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
