//! Recomendación de manejo según nivel ACR TI-RADS y dimensión máxima,
//! y opciones de tratamiento asociadas a la acción.

use serde::Serialize;

use crate::acr::TrLevel;
use crate::models::RiskFactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoAction,
    FollowUp,
    Fna,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::FollowUp => "follow_up",
            Self::Fna => "fna",
        }
    }

    pub fn label_tr(&self) -> &'static str {
        match self {
            Self::NoAction => "Eylem Gerektirmez",
            Self::FollowUp => "Takip Önerilir",
            Self::Fna => "İİAB (İnce İğne Aspirasyon Biyopsisi)",
        }
    }

    pub fn label_en(&self) -> &'static str {
        match self {
            Self::NoAction => "No Action Required",
            Self::FollowUp => "Follow-up Recommended",
            Self::Fna => "FNA (Fine Needle Aspiration) Biopsy",
        }
    }

    /// Vocabulario usado para enriquecer las consultas de recuperación.
    pub fn query_terms(&self) -> &'static str {
        match self {
            Self::NoAction => "benign observation no intervention",
            Self::FollowUp => "follow-up surveillance monitoring ultrasound",
            Self::Fna => "fine needle aspiration biopsy FNA cytology",
        }
    }
}

/// Umbrales de tamaño (mm) de la tabla ACR: seguimiento y PAAF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeThresholds {
    pub follow_up_mm: f64,
    pub fna_mm: f64,
}

/// `None` para TR1/TR2: sin acción independientemente del tamaño.
pub fn size_thresholds(level: TrLevel) -> Option<SizeThresholds> {
    match level {
        TrLevel::TR1 | TrLevel::TR2 => None,
        TrLevel::TR3 => Some(SizeThresholds { follow_up_mm: 15.0, fna_mm: 25.0 }),
        TrLevel::TR4 => Some(SizeThresholds { follow_up_mm: 10.0, fna_mm: 15.0 }),
        TrLevel::TR5 => Some(SizeThresholds { follow_up_mm: 5.0, fna_mm: 10.0 }),
    }
}

/// Acción como función pura de (nivel, dimensión máxima). Comparaciones `>=`.
pub fn resolve_action(level: TrLevel, max_dimension_mm: f64) -> Action {
    match size_thresholds(level) {
        None => Action::NoAction,
        Some(t) if max_dimension_mm >= t.fna_mm => Action::Fna,
        Some(t) if max_dimension_mm >= t.follow_up_mm => Action::FollowUp,
        Some(_) => Action::NoAction,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: Action,
    pub label_tr: &'static str,
    pub label_en: &'static str,
    pub rationale: String,
    pub rationale_tr: String,
}

pub fn get_recommendation(
    level: TrLevel,
    max_dimension_mm: f64,
    risk_factors: &[RiskFactor],
) -> Recommendation {
    let action = resolve_action(level, max_dimension_mm);
    let size = max_dimension_mm;

    let (mut rationale, mut rationale_tr) = match (size_thresholds(level), action) {
        (None, _) => (
            format!("{level} nodules are benign or not suspicious and do not require FNA or routine follow-up regardless of size."),
            format!("{level} nodüller benign veya şüpheli değildir; boyuttan bağımsız olarak İİAB veya rutin takip gerektirmez."),
        ),
        (Some(t), Action::Fna) => (
            format!("{level} nodule with maximum dimension {size}mm (>={}mm threshold) requires FNA.", t.fna_mm),
            format!("{level} nodül, maksimum boyutu {size}mm (>={}mm eşiği) olduğundan İİAB gerektirir.", t.fna_mm),
        ),
        (Some(t), Action::FollowUp) => (
            format!("{level} nodule with maximum dimension {size}mm (>={}mm threshold) requires follow-up ultrasound.", t.follow_up_mm),
            format!("{level} nodül, maksimum boyutu {size}mm (>={}mm eşiği) olduğundan takip ultrasonografisi gerektirir.", t.follow_up_mm),
        ),
        (Some(t), Action::NoAction) => (
            format!("{level} nodule with maximum dimension {size}mm (<{}mm threshold) does not require action.", t.follow_up_mm),
            format!("{level} nodül, maksimum boyutu {size}mm (<{}mm eşiği) olduğundan eylem gerektirmez.", t.follow_up_mm),
        ),
    };

    if !risk_factors.is_empty() && action != Action::Fna {
        rationale.push_str(" Clinical risk factors present may warrant earlier intervention.");
        rationale_tr.push_str(" Mevcut klinik risk faktörleri daha erken müdahale gerektirebilir.");
    }

    Recommendation {
        action,
        label_tr: action.label_tr(),
        label_en: action.label_en(),
        rationale,
        rationale_tr,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentOptions {
    pub surgical: Vec<&'static str>,
    pub non_surgical: Vec<&'static str>,
}

pub fn treatment_options(action: Action) -> TreatmentOptions {
    match action {
        Action::Fna => TreatmentOptions {
            surgical: vec!["Total tiroidektomi", "Lobektomi", "Hemitiroidektomi"],
            non_surgical: vec![
                "Aktif izlem (biyopsi sonucuna göre)",
                "Radyofrekans ablasyon (RFA)",
                "Etanol ablasyonu",
                "Mikrodalga ablasyonu",
            ],
        },
        Action::FollowUp => TreatmentOptions {
            surgical: vec!["Biyopsi sonucuna göre değerlendirilecek"],
            non_surgical: vec!["Aktif izlem", "Periyodik ultrasonografi", "6-12 ay sonra kontrol"],
        },
        Action::NoAction => TreatmentOptions {
            surgical: Vec::new(),
            non_surgical: vec![
                "Rutin takip gerektirmez",
                "Klinik endikasyon varsa yeniden değerlendirme",
            ],
        },
    }
}
