//! Modelos de dominio de la petición de evaluación: hallazgos ecográficos
//! (enumeraciones cerradas), medidas y datos clínicos.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::size::SizeMeasurement;

/// Longitud máxima de los campos de texto libre de la información clínica.
const MAX_DETAIL_CHARS: usize = 1000;
const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    Cystic,
    Spongiform,
    MixedCysticSolid,
    #[default]
    Solid,
    AlmostSolid,
}

impl Composition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cystic => "cystic",
            Self::Spongiform => "spongiform",
            Self::MixedCysticSolid => "mixed_cystic_solid",
            Self::Solid => "solid",
            Self::AlmostSolid => "almost_solid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Echogenicity {
    Anechoic,
    Hyperechoic,
    #[default]
    Isoechoic,
    Hypoechoic,
    VeryHypoechoic,
    ModeratelyHypoechoic,
    MarkedlyHypoechoic,
}

impl Echogenicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anechoic => "anechoic",
            Self::Hyperechoic => "hyperechoic",
            Self::Isoechoic => "isoechoic",
            Self::Hypoechoic => "hypoechoic",
            Self::VeryHypoechoic => "very_hypoechoic",
            Self::ModeratelyHypoechoic => "moderately_hypoechoic",
            Self::MarkedlyHypoechoic => "markedly_hypoechoic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    WiderThanTall,
    TallerThanWide,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WiderThanTall => "wider_than_tall",
            Self::TallerThanWide => "taller_than_wide",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Margin {
    #[default]
    Smooth,
    IllDefined,
    Lobulated,
    Irregular,
    Microlobulated,
    ExtrathyroidalExtension,
}

impl Margin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::IllDefined => "ill_defined",
            Self::Lobulated => "lobulated",
            Self::Irregular => "irregular",
            Self::Microlobulated => "microlobulated",
            Self::ExtrathyroidalExtension => "extrathyroidal_extension",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchogenicFoci {
    #[default]
    None,
    LargeCometTail,
    Macrocalcifications,
    PeripheralCalcifications,
    PunctateEchogenicFoci,
    Microcalcifications,
}

impl EchogenicFoci {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LargeCometTail => "large_comet_tail",
            Self::Macrocalcifications => "macrocalcifications",
            Self::PeripheralCalcifications => "peripheral_calcifications",
            Self::PunctateEchogenicFoci => "punctate_echogenic_foci",
            Self::Microcalcifications => "microcalcifications",
        }
    }
}

/// Conjunto de hallazgos ecográficos. Es la única entrada de los
/// clasificadores ACR y EU; inmutable una vez recibido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default)]
    pub composition: Composition,
    #[serde(default)]
    pub echogenicity: Echogenicity,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub margin: Margin,
    #[serde(default)]
    pub echogenic_foci: EchogenicFoci,
}

impl Findings {
    /// Serializa los hallazgos como pares `categoría: valor`, en orden fijo.
    pub fn describe(&self) -> String {
        format!(
            "composition: {}, echogenicity: {}, shape: {}, margin: {}, echogenic_foci: {}",
            self.composition.as_str(),
            self.echogenicity.as_str(),
            self.shape.as_str(),
            self.margin.as_str(),
            self.echogenic_foci.as_str(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

/// Información clínica opcional. El motor de puntuación no la usa; sirve
/// como contexto de las explicaciones y para la nota de factores de riesgo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub family_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_history_detail: Option<String>,
    #[serde(default)]
    pub radiation_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiation_history_detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    FamilyHistory,
    RadiationHistory,
}

impl ClinicalInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(age) = self.age {
            if age > MAX_AGE {
                return Err(ValidationError::new(
                    "clinical.age",
                    format!("debe estar entre 0 y {MAX_AGE}"),
                ));
            }
        }
        for (field, detail) in [
            ("clinical.family_history_detail", &self.family_history_detail),
            ("clinical.radiation_history_detail", &self.radiation_history_detail),
        ] {
            if let Some(text) = detail {
                if text.chars().count() > MAX_DETAIL_CHARS {
                    return Err(ValidationError::new(
                        field,
                        format!("no puede superar {MAX_DETAIL_CHARS} caracteres"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn risk_factors(&self) -> Vec<RiskFactor> {
        let mut factors = Vec::new();
        if self.family_history {
            factors.push(RiskFactor::FamilyHistory);
        }
        if self.radiation_history {
            factors.push(RiskFactor::RadiationHistory);
        }
        factors
    }

    /// Líneas de contexto clínico para los prompts. Vacío si no hay datos.
    pub fn context_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(age) = self.age {
            lines.push(format!("Age: {age}"));
        }
        if let Some(sex) = self.sex {
            lines.push(format!("Sex: {}", sex.as_str()));
        }
        if self.family_history {
            lines.push(with_detail("Family history of thyroid cancer: yes", &self.family_history_detail));
        }
        if self.radiation_history {
            lines.push(with_detail("Head/neck radiation history: yes", &self.radiation_history_detail));
        }
        lines
    }
}

fn with_detail(base: &str, detail: &Option<String>) -> String {
    match detail.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => format!("{base} ({d})"),
        _ => base.to_string(),
    }
}

/// Petición de evaluación de un nódulo, ya tipada. Se valida en la frontera
/// (`validate`) antes de invocar el motor; el motor nunca ve JSON crudo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(flatten)]
    pub findings: Findings,
    pub size: SizeMeasurement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical: Option<ClinicalInfo>,
}

impl EvaluationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.size.validate()?;
        if let Some(clinical) = &self.clinical {
            clinical.validate()?;
        }
        Ok(())
    }

    pub fn risk_factors(&self) -> Vec<RiskFactor> {
        self.clinical
            .as_ref()
            .map(ClinicalInfo::risk_factors)
            .unwrap_or_default()
    }
}
