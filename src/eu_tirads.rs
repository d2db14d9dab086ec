//! Clasificación EU-TIRADS (European Thyroid Association).
//!
//! Algoritmo cualitativo: patrón benigno (quiste o espongiforme) → 2; en
//! otro caso la categoría depende del número de rasgos sospechosos:
//! ninguno → 3, uno → 4, dos o más → 5.

use serde::Serialize;

use crate::models::{Composition, EchogenicFoci, Echogenicity, Findings, Margin, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EuLevel {
    Eu2,
    Eu3,
    Eu4,
    Eu5,
}

impl EuLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eu2 => "EU-TIRADS 2",
            Self::Eu3 => "EU-TIRADS 3",
            Self::Eu4 => "EU-TIRADS 4",
            Self::Eu5 => "EU-TIRADS 5",
        }
    }

    pub fn risk_category(&self) -> &'static str {
        match self {
            Self::Eu2 => "Benign",
            Self::Eu3 => "Low risk",
            Self::Eu4 => "Intermediate risk",
            Self::Eu5 => "High risk",
        }
    }

    pub fn malignancy_risk(&self) -> &'static str {
        match self {
            Self::Eu2 => "~0%",
            Self::Eu3 => "2-4%",
            Self::Eu4 => "6-17%",
            Self::Eu5 => "26-87%",
        }
    }
}

impl std::fmt::Display for EuLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EuLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EuResult {
    pub eu_level: EuLevel,
    pub risk_category: &'static str,
    pub malignancy_risk: &'static str,
    pub high_suspicious_features: Vec<&'static str>,
}

/// Rasgos sospechosos presentes, en orden fijo de categoría.
pub fn suspicious_features(findings: &Findings) -> Vec<&'static str> {
    let mut features = Vec::new();

    if findings.shape == Shape::TallerThanWide {
        features.push("Taller-than-wide shape");
    }

    match findings.margin {
        Margin::Irregular => features.push("Irregular margin"),
        Margin::Microlobulated => features.push("Microlobulated margin"),
        Margin::ExtrathyroidalExtension => features.push("Extrathyroidal extension"),
        Margin::Smooth | Margin::IllDefined | Margin::Lobulated => {}
    }

    match findings.echogenic_foci {
        EchogenicFoci::Microcalcifications | EchogenicFoci::PunctateEchogenicFoci => {
            features.push("Microcalcifications")
        }
        EchogenicFoci::Macrocalcifications | EchogenicFoci::PeripheralCalcifications => {
            features.push("Macrocalcifications")
        }
        EchogenicFoci::None | EchogenicFoci::LargeCometTail => {}
    }

    if matches!(
        findings.echogenicity,
        Echogenicity::VeryHypoechoic | Echogenicity::MarkedlyHypoechoic
    ) {
        features.push("Marked hypoechogenicity");
    }

    features
}

pub fn classify_eu_tirads(findings: &Findings) -> EuResult {
    let high_suspicious_features = suspicious_features(findings);

    let eu_level = match findings.composition {
        Composition::Cystic | Composition::Spongiform => EuLevel::Eu2,
        _ => match high_suspicious_features.len() {
            0 => EuLevel::Eu3,
            1 => EuLevel::Eu4,
            _ => EuLevel::Eu5,
        },
    };

    EuResult {
        eu_level,
        risk_category: eu_level.risk_category(),
        malignancy_risk: eu_level.malignancy_risk(),
        high_suspicious_features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acr::tests::any_findings;
    use proptest::prelude::*;

    #[test]
    fn simple_cyst_is_benign() {
        let findings = Findings {
            composition: Composition::Cystic,
            echogenicity: Echogenicity::Anechoic,
            ..Default::default()
        };
        let result = classify_eu_tirads(&findings);
        assert_eq!(result.eu_level, EuLevel::Eu2);
        assert_eq!(result.risk_category, "Benign");
        assert_eq!(result.malignancy_risk, "~0%");
    }

    #[test]
    fn spongiform_is_benign() {
        let findings = Findings {
            composition: Composition::Spongiform,
            ..Default::default()
        };
        assert_eq!(classify_eu_tirads(&findings).eu_level, EuLevel::Eu2);
    }

    #[test]
    fn solid_without_suspicious_features_is_low_risk() {
        let result = classify_eu_tirads(&Findings::default());
        assert_eq!(result.eu_level, EuLevel::Eu3);
        assert_eq!(result.risk_category, "Low risk");
        assert!(result.high_suspicious_features.is_empty());
    }

    #[test]
    fn one_suspicious_feature_is_intermediate() {
        let findings = Findings {
            shape: Shape::TallerThanWide,
            ..Default::default()
        };
        let result = classify_eu_tirads(&findings);
        assert_eq!(result.eu_level, EuLevel::Eu4);
        assert_eq!(result.high_suspicious_features, vec!["Taller-than-wide shape"]);
    }

    #[test]
    fn several_suspicious_features_are_high_risk() {
        let findings = Findings {
            composition: Composition::Solid,
            echogenicity: Echogenicity::MarkedlyHypoechoic,
            shape: Shape::TallerThanWide,
            margin: Margin::Irregular,
            echogenic_foci: EchogenicFoci::Microcalcifications,
        };
        let result = classify_eu_tirads(&findings);
        assert_eq!(result.eu_level, EuLevel::Eu5);
        assert_eq!(result.malignancy_risk, "26-87%");
        assert_eq!(
            result.high_suspicious_features,
            vec![
                "Taller-than-wide shape",
                "Irregular margin",
                "Microcalcifications",
                "Marked hypoechogenicity",
            ]
        );
    }

    #[test]
    fn level_serializes_as_display_name() {
        let json = serde_json::to_value(classify_eu_tirads(&Findings::default())).unwrap();
        assert_eq!(json["eu_level"], "EU-TIRADS 3");
    }

    proptest! {
        #[test]
        fn level_follows_feature_count(findings in any_findings()) {
            let result = classify_eu_tirads(&findings);
            let count = result.high_suspicious_features.len();
            match findings.composition {
                Composition::Cystic | Composition::Spongiform => {
                    prop_assert_eq!(result.eu_level, EuLevel::Eu2)
                }
                _ => {
                    let expected = match count { 0 => EuLevel::Eu3, 1 => EuLevel::Eu4, _ => EuLevel::Eu5 };
                    prop_assert_eq!(result.eu_level, expected);
                }
            }
        }

        #[test]
        fn adding_a_suspicious_feature_never_lowers_the_level(findings in any_findings()) {
            let before = classify_eu_tirads(&findings);
            let escalated = Findings { shape: Shape::TallerThanWide, ..findings };
            let after = classify_eu_tirads(&escalated);
            prop_assert!(after.high_suspicious_features.len() >= before.high_suspicious_features.len());
            prop_assert!(after.eu_level >= before.eu_level);
        }
    }
}
