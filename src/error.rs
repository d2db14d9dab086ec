//! Taxonomía de errores del motor de evaluación.
//!
//! - `ValidationError`: la petición no cumple el contrato; se rechaza en la
//!   frontera HTTP antes de llegar al motor.
//! - `RetrievalError`: la recuperación de pasajes de una guía no es posible;
//!   degrada sólo la explicación y las fuentes de esa guía.
//! - `GenerationError`: el colaborador de generación de texto falló o agotó
//!   el tiempo (o citó fuentes ajenas); degrada sólo el texto de esa guía y
//!   conserva sus fuentes.

use std::time::Duration;

use thiserror::Error;

/// Error de validación de la petición, asociado al campo que lo provoca.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("el índice vectorial de guías no está cargado")]
    Unavailable,

    #[error("no se pudo generar el embedding de la consulta: {0}")]
    Embedding(String),

    #[error("dimensión del embedding de la consulta ({query}) distinta a la del índice ({index})")]
    DimensionMismatch { query: usize, index: usize },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("la generación de texto falló: {0}")]
    Failed(String),

    #[error("la generación de texto superó el tiempo límite de {0:?}")]
    Timeout(Duration),

    #[error("el texto generado cita una fuente no suministrada: [{0}]")]
    Ungrounded(String),
}
