//! Explicaciones por guía ancladas en los pasajes recuperados.
//!
//! Para cada guía:
//!   1. Sin pasajes (o sin índice) no se llama al LLM: mensaje fijo.
//!   2. Con pasajes, se construye un prompt con los hallazgos, la
//!      clasificación de esa guía y los pasajes literales etiquetados.
//!   3. La generación tiene un tiempo límite; si falla, si se agota o si
//!      cita etiquetas que no se le dieron, se devuelve un mensaje fijo y se
//!      conservan las fuentes recuperadas.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::acr::AcrResult;
use crate::error::{GenerationError, RetrievalError};
use crate::eu_tirads::EuResult;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::models::{ClinicalInfo, Findings};
use crate::recommendation::Recommendation;
use crate::retriever::RetrievedChunk;
use crate::size::SizeResult;
use crate::vector_store::GuidelineTrack;

const SYSTEM_PROMPT: &str = r#"
You are an endocrinology and radiology assistant that explains thyroid nodule assessments.
You may ONLY use the guideline passages supplied in the context. Every statement taken from a passage must cite it with its label in square brackets, exactly as given, e.g. [america_3_00].
Do not cite anything else and do not add facts that the passages do not support.
If the passages do not cover a point, say that the guideline passages do not address it.
Write at most 3-4 sentences, specific to this nodule, without general thyroid background.
"#;

/// Datos de la evaluación que se exponen al generador.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationContext<'a> {
    pub findings: &'a Findings,
    pub size: &'a SizeResult,
    pub clinical: Option<&'a ClinicalInfo>,
    pub acr: &'a AcrResult,
    pub eu: &'a EuResult,
    pub recommendation: &'a Recommendation,
}

/// Resultado de una rama (guía): texto y fuentes, siempre presentes.
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub track: GuidelineTrack,
    pub explanation: String,
    pub sources: Vec<RetrievedChunk>,
}

pub fn insufficient_evidence_message(track: GuidelineTrack) -> String {
    format!(
        "Insufficient guideline evidence: no passages from the {} were found for this nodule, so no explanation was generated.",
        track.display_name()
    )
}

pub fn generation_failed_message(track: GuidelineTrack) -> String {
    format!(
        "The explanation based on the {} could not be generated. The retrieved guideline passages are listed in the sources.",
        track.display_name()
    )
}

pub const NO_NATIONAL_SUMMARY: &str =
    "No relevant passage was found in the national guideline for this nodule.";

/// Resumen de la guía nacional: los dos primeros extractos, literales.
pub fn national_summary(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_NATIONAL_SUMMARY.to_string();
    }
    chunks
        .iter()
        .take(2)
        .map(|c| c.excerpt.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn source_label(chunk: &RetrievedChunk) -> String {
    format!("[{}]", chunk.chunk_id)
}

fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "{} ({}, page {}):\n{}",
                source_label(c),
                c.doc_id,
                c.page,
                c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn track_classification(track: GuidelineTrack, ctx: &ExplanationContext<'_>) -> String {
    match track {
        GuidelineTrack::National | GuidelineTrack::Us => format!(
            "ACR TI-RADS {} ({}, {} points)",
            ctx.acr.tr_level, ctx.acr.description, ctx.acr.points
        ),
        GuidelineTrack::Eu => {
            let mut text = format!(
                "{} ({}, malignancy risk {})",
                ctx.eu.eu_level, ctx.eu.risk_category, ctx.eu.malignancy_risk
            );
            if !ctx.eu.high_suspicious_features.is_empty() {
                text.push_str(&format!(
                    "; high suspicion features: {}",
                    ctx.eu.high_suspicious_features.join(", ")
                ));
            }
            text
        }
    }
}

pub fn build_prompt(track: GuidelineTrack, ctx: &ExplanationContext<'_>, language: &str) -> String {
    let mut lines = vec![
        format!(
            "Explain this thyroid nodule assessment according to the {}.",
            track.display_name()
        ),
        format!("Findings: {}", ctx.findings.describe()),
        format!("Maximum dimension: {} mm", ctx.size.max_dimension_mm),
    ];
    if let Some(volume) = ctx.size.volume_mm3 {
        lines.push(format!("Volume: {volume:.1} mm3"));
    }
    lines.push(format!("Classification: {}", track_classification(track, ctx)));
    lines.push(format!(
        "Recommended action: {} ({})",
        ctx.recommendation.action.as_str(),
        ctx.recommendation.label_en
    ));

    let clinical = ctx.clinical.map(ClinicalInfo::context_lines).unwrap_or_default();
    if !clinical.is_empty() {
        lines.push("Clinical information:".to_string());
        lines.extend(clinical.into_iter().map(|l| format!("- {l}")));
    }

    lines.push(format!("Answer in {language}."));
    lines.join("\n")
}

/// Comprueba que todas las citas `[...]` del texto generado remitan a los
/// pasajes suministrados.
///
/// Un corchete puede agrupar varias referencias separadas por `,` o `;`.
/// Toda referencia con forma de identificador (`america_3_00`) debe ser un
/// `chunk_id` o `doc_id` suministrado; una referencia a página (`page 12`)
/// sólo es válida si el mismo corchete cita un chunk suministrado o un
/// documento suministrado con esa página. El texto entre corchetes sin esa
/// forma (`[see above]`) no se considera cita.
pub fn check_citations(text: &str, chunks: &[RetrievedChunk]) -> Result<(), GenerationError> {
    let chunk_ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    let doc_ids: HashSet<&str> = chunks.iter().map(|c| c.doc_id.as_str()).collect();

    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else { break };
        let label = after[..close].trim();
        rest = &after[close + 1..];

        let mut cites_chunk = false;
        let mut cited_doc = None;
        let mut pages = Vec::new();
        for token in label.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(page) = page_reference(token) {
                pages.push(page);
            } else if chunk_ids.contains(token) {
                cites_chunk = true;
            } else if doc_ids.contains(token) {
                cited_doc = Some(token);
            } else if looks_like_reference(token) {
                return Err(GenerationError::Ungrounded(token.to_string()));
            }
        }

        if cites_chunk || pages.is_empty() {
            continue;
        }
        let page_supplied = |page: u32| {
            chunks
                .iter()
                .any(|c| Some(c.doc_id.as_str()) == cited_doc && c.page == page)
        };
        if !pages.into_iter().all(page_supplied) {
            return Err(GenerationError::Ungrounded(label.to_string()));
        }
    }
    Ok(())
}

/// `page 12` / `p. 12` → 12.
fn page_reference(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    let number = lower
        .strip_prefix("page")
        .or_else(|| lower.strip_prefix("p."))?
        .trim();
    number.parse().ok()
}

fn looks_like_reference(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && token.chars().any(|c| c == '_' || c.is_ascii_digit())
}

#[derive(Clone)]
pub struct ExplanationComposer {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
    language: String,
}

impl ExplanationComposer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, timeout: Duration, language: impl Into<String>) -> Self {
        Self {
            generator,
            timeout,
            language: language.into(),
        }
    }

    /// Compone la explicación de una guía. Nunca falla: los errores de
    /// recuperación y generación se degradan a mensajes fijos.
    pub async fn compose(
        &self,
        track: GuidelineTrack,
        ctx: &ExplanationContext<'_>,
        retrieved: Result<Vec<RetrievedChunk>, RetrievalError>,
    ) -> TrackOutcome {
        let sources = match retrieved {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(track = track.as_str(), "Recuperación no disponible: {err}");
                Vec::new()
            }
        };

        if sources.is_empty() {
            return TrackOutcome {
                track,
                explanation: insufficient_evidence_message(track),
                sources,
            };
        }

        let explanation = match self.generate(track, ctx, &sources).await {
            Ok(text) => text,
            Err(err) => {
                warn!(track = track.as_str(), "Explicación degradada: {err}");
                generation_failed_message(track)
            }
        };

        TrackOutcome {
            track,
            explanation,
            sources,
        }
    }

    async fn generate(
        &self,
        track: GuidelineTrack,
        ctx: &ExplanationContext<'_>,
        sources: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| GenerationError::Failed("no hay generador de texto configurado".into()))?;

        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT.trim().to_string(),
            context: build_context(sources),
            prompt: build_prompt(track, ctx, &self.language),
        };

        let text = tokio::time::timeout(self.timeout, generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::Failed("respuesta vacía".into()));
        }
        check_citations(&text, sources)?;

        info!(
            track = track.as_str(),
            sources = sources.len(),
            top_score = sources[0].score,
            "Explicación generada"
        );
        Ok(text)
    }
}
