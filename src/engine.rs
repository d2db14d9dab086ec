//! Orquestación de una evaluación completa y ensamblado de la respuesta.
//!
//! Flujo:
//!   1. Tamaño, ACR TI-RADS y EU-TIRADS (cálculos puros).
//!   2. Recomendación a partir del nivel TR y la dimensión máxima.
//!   3. Por cada guía (nacional, EE. UU., UE), recuperación + explicación;
//!      las tres ramas se ejecutan a la vez y se unen antes de ensamblar.
//!
//! Las ramas son futuros del propio request: si el cliente aborta la
//! petición, se abandonan junto con ella.

use serde::Serialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::acr::{calculate_acr_tirads, AcrResult};
use crate::error::ValidationError;
use crate::eu_tirads::{classify_eu_tirads, EuResult};
use crate::models::EvaluationRequest;
use crate::rag::{national_summary, ExplanationComposer, ExplanationContext, TrackOutcome};
use crate::recommendation::{get_recommendation, treatment_options, Recommendation, TreatmentOptions};
use crate::retriever::{build_query, GuidelineRetriever, QueryContext, RetrievedChunk};
use crate::size::{calculate_size, SizeResult};
use crate::vector_store::GuidelineTrack;

/// Cita de un pasaje de guía, copiada del índice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub track: GuidelineTrack,
    pub doc_id: String,
    pub page: u32,
    pub chunk_id: String,
    pub excerpt: String,
}

impl From<&RetrievedChunk> for Source {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            track: chunk.track,
            doc_id: chunk.doc_id.clone(),
            page: chunk.page,
            chunk_id: chunk.chunk_id.clone(),
            excerpt: chunk.excerpt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidelineSummary {
    pub summary: String,
}

/// Explicaciones por guía: `tr` (nacional), `us` (ACR), `eu` (EU-TIRADS).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationSet {
    pub tr: String,
    pub us: String,
    pub eu: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResponse {
    pub input_echo: EvaluationRequest,
    pub acr: AcrResult,
    pub eu: EuResult,
    pub tr_guideline: GuidelineSummary,
    pub size: SizeResult,
    pub recommendation: Recommendation,
    pub treatment_options: TreatmentOptions,
    pub llm_explanation: ExplanationSet,
    pub sources: Vec<Source>,
}

#[derive(Clone)]
pub struct EvaluationEngine {
    retriever: GuidelineRetriever,
    composer: ExplanationComposer,
}

impl EvaluationEngine {
    pub fn new(retriever: GuidelineRetriever, composer: ExplanationComposer) -> Self {
        Self { retriever, composer }
    }

    pub fn retriever(&self) -> &GuidelineRetriever {
        &self.retriever
    }

    /// Evalúa un nódulo. Sólo falla por validación; las explicaciones y las
    /// fuentes se degradan por guía sin afectar al resto de la respuesta.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, ValidationError> {
        let span = tracing::info_span!("evaluate", request_id = %Uuid::new_v4());
        self.evaluate_inner(request).instrument(span).await
    }

    async fn evaluate_inner(&self, request: EvaluationRequest) -> Result<EvaluationResponse, ValidationError> {
        request.validate()?;
        let findings = request.findings;

        let size = calculate_size(&request.size)?;
        let acr = calculate_acr_tirads(&findings);
        let eu = classify_eu_tirads(&findings);
        let recommendation = get_recommendation(acr.tr_level, size.max_dimension_mm, &request.risk_factors());
        let treatment_options = treatment_options(recommendation.action);

        info!(
            tr_level = acr.tr_level.as_str(),
            points = acr.points,
            eu_level = eu.eu_level.as_str(),
            action = recommendation.action.as_str(),
            "Clasificación calculada"
        );

        let query_ctx = QueryContext {
            findings: &findings,
            tr_level: acr.tr_level,
            eu: &eu,
            action: recommendation.action,
        };
        let explanation_ctx = ExplanationContext {
            findings: &findings,
            size: &size,
            clinical: request.clinical.as_ref(),
            acr: &acr,
            eu: &eu,
            recommendation: &recommendation,
        };

        let (national, us, europe) = futures::join!(
            self.run_track(GuidelineTrack::National, &query_ctx, &explanation_ctx),
            self.run_track(GuidelineTrack::Us, &query_ctx, &explanation_ctx),
            self.run_track(GuidelineTrack::Eu, &query_ctx, &explanation_ctx),
        );

        let tr_guideline = GuidelineSummary {
            summary: national_summary(&national.sources),
        };
        let sources = [&national, &us, &europe]
            .into_iter()
            .flat_map(|outcome| outcome.sources.iter().map(Source::from))
            .collect();

        Ok(EvaluationResponse {
            acr,
            eu,
            tr_guideline,
            size,
            recommendation,
            treatment_options,
            llm_explanation: ExplanationSet {
                tr: national.explanation,
                us: us.explanation,
                eu: europe.explanation,
            },
            sources,
            input_echo: request,
        })
    }

    async fn run_track(
        &self,
        track: GuidelineTrack,
        query_ctx: &QueryContext<'_>,
        explanation_ctx: &ExplanationContext<'_>,
    ) -> TrackOutcome {
        let query = build_query(track, query_ctx);
        let retrieved = self.retriever.retrieve(track, &query).await;
        self.composer.compose(track, explanation_ctx, retrieved).await
    }
}
