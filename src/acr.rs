//! Clasificación ACR TI-RADS (American College of Radiology, léxico 2017).
//!
//! Cada categoría aporta puntos de forma independiente; el total determina
//! el nivel TR1–TR5.

use serde::Serialize;

use crate::models::{Composition, EchogenicFoci, Echogenicity, Findings, Margin, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TrLevel {
    TR1,
    TR2,
    TR3,
    TR4,
    TR5,
}

impl TrLevel {
    /// Bandas de puntos: 0 → TR1, 1–2 → TR2, 3 → TR3, 4–6 → TR4, ≥7 → TR5.
    pub fn from_points(points: u32) -> Self {
        match points {
            0 => Self::TR1,
            1..=2 => Self::TR2,
            3 => Self::TR3,
            4..=6 => Self::TR4,
            _ => Self::TR5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TR1 => "TR1",
            Self::TR2 => "TR2",
            Self::TR3 => "TR3",
            Self::TR4 => "TR4",
            Self::TR5 => "TR5",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::TR1 => "Benign",
            Self::TR2 => "Not suspicious",
            Self::TR3 => "Mildly suspicious",
            Self::TR4 => "Moderately suspicious",
            Self::TR5 => "Highly suspicious",
        }
    }
}

impl std::fmt::Display for TrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn composition_points(value: Composition) -> u32 {
    match value {
        Composition::Cystic | Composition::Spongiform => 0,
        Composition::MixedCysticSolid => 1,
        Composition::Solid | Composition::AlmostSolid => 2,
    }
}

pub fn echogenicity_points(value: Echogenicity) -> u32 {
    match value {
        Echogenicity::Anechoic => 0,
        Echogenicity::Hyperechoic | Echogenicity::Isoechoic => 1,
        Echogenicity::Hypoechoic | Echogenicity::ModeratelyHypoechoic => 2,
        Echogenicity::VeryHypoechoic | Echogenicity::MarkedlyHypoechoic => 3,
    }
}

pub fn shape_points(value: Shape) -> u32 {
    match value {
        Shape::WiderThanTall => 0,
        Shape::TallerThanWide => 3,
    }
}

pub fn margin_points(value: Margin) -> u32 {
    match value {
        Margin::Smooth | Margin::IllDefined => 0,
        Margin::Lobulated | Margin::Microlobulated | Margin::Irregular => 2,
        Margin::ExtrathyroidalExtension => 3,
    }
}

pub fn echogenic_foci_points(value: EchogenicFoci) -> u32 {
    match value {
        EchogenicFoci::None | EchogenicFoci::LargeCometTail => 0,
        EchogenicFoci::Macrocalcifications => 1,
        EchogenicFoci::PeripheralCalcifications => 2,
        EchogenicFoci::PunctateEchogenicFoci | EchogenicFoci::Microcalcifications => 3,
    }
}

/// Valor elegido y puntos aportados por una categoría.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryPoints<T> {
    pub value: T,
    pub points: u32,
}

impl<T> CategoryPoints<T> {
    fn new(value: T, points: u32) -> Self {
        Self { value, points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointBreakdown {
    pub composition: CategoryPoints<Composition>,
    pub echogenicity: CategoryPoints<Echogenicity>,
    pub shape: CategoryPoints<Shape>,
    pub margin: CategoryPoints<Margin>,
    pub echogenic_foci: CategoryPoints<EchogenicFoci>,
}

impl PointBreakdown {
    pub fn total(&self) -> u32 {
        self.composition.points
            + self.echogenicity.points
            + self.shape.points
            + self.margin.points
            + self.echogenic_foci.points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcrResult {
    pub points: u32,
    pub tr_level: TrLevel,
    pub description: &'static str,
    pub point_breakdown: PointBreakdown,
}

/// Un nódulo espongiforme no suma puntos en el resto de categorías; los
/// valores elegidos se conservan en el desglose con 0 puntos.
pub fn calculate_acr_tirads(findings: &Findings) -> AcrResult {
    let scored = |points: u32| {
        if findings.composition == Composition::Spongiform {
            0
        } else {
            points
        }
    };

    let point_breakdown = PointBreakdown {
        composition: CategoryPoints::new(findings.composition, composition_points(findings.composition)),
        echogenicity: CategoryPoints::new(
            findings.echogenicity,
            scored(echogenicity_points(findings.echogenicity)),
        ),
        shape: CategoryPoints::new(findings.shape, scored(shape_points(findings.shape))),
        margin: CategoryPoints::new(findings.margin, scored(margin_points(findings.margin))),
        echogenic_foci: CategoryPoints::new(
            findings.echogenic_foci,
            scored(echogenic_foci_points(findings.echogenic_foci)),
        ),
    };

    let points = point_breakdown.total();
    let tr_level = TrLevel::from_points(points);

    AcrResult {
        points,
        tr_level,
        description: tr_level.description(),
        point_breakdown,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn any_findings() -> impl Strategy<Value = Findings> {
        (
            prop::sample::select(vec![
                Composition::Cystic,
                Composition::Spongiform,
                Composition::MixedCysticSolid,
                Composition::Solid,
                Composition::AlmostSolid,
            ]),
            prop::sample::select(vec![
                Echogenicity::Anechoic,
                Echogenicity::Hyperechoic,
                Echogenicity::Isoechoic,
                Echogenicity::Hypoechoic,
                Echogenicity::VeryHypoechoic,
                Echogenicity::ModeratelyHypoechoic,
                Echogenicity::MarkedlyHypoechoic,
            ]),
            prop::sample::select(vec![Shape::WiderThanTall, Shape::TallerThanWide]),
            prop::sample::select(vec![
                Margin::Smooth,
                Margin::IllDefined,
                Margin::Lobulated,
                Margin::Irregular,
                Margin::Microlobulated,
                Margin::ExtrathyroidalExtension,
            ]),
            prop::sample::select(vec![
                EchogenicFoci::None,
                EchogenicFoci::LargeCometTail,
                EchogenicFoci::Macrocalcifications,
                EchogenicFoci::PeripheralCalcifications,
                EchogenicFoci::PunctateEchogenicFoci,
                EchogenicFoci::Microcalcifications,
            ]),
        )
            .prop_map(|(composition, echogenicity, shape, margin, echogenic_foci)| Findings {
                composition,
                echogenicity,
                shape,
                margin,
                echogenic_foci,
            })
    }

    #[test]
    fn highly_suspicious_nodule_is_tr5() {
        let findings = Findings {
            composition: Composition::Solid,
            echogenicity: Echogenicity::MarkedlyHypoechoic,
            shape: Shape::TallerThanWide,
            margin: Margin::Irregular,
            echogenic_foci: EchogenicFoci::Microcalcifications,
        };
        let result = calculate_acr_tirads(&findings);
        assert_eq!(result.points, 2 + 3 + 3 + 2 + 3);
        assert_eq!(result.tr_level, TrLevel::TR5);
        assert_eq!(result.description, "Highly suspicious");
    }

    #[test]
    fn spongiform_anechoic_nodule_is_tr1() {
        let findings = Findings {
            composition: Composition::Spongiform,
            echogenicity: Echogenicity::Anechoic,
            ..Default::default()
        };
        let result = calculate_acr_tirads(&findings);
        assert_eq!(result.points, 0);
        assert_eq!(result.tr_level, TrLevel::TR1);
    }

    #[test]
    fn spongiform_adds_no_points_from_other_categories() {
        let plain = Findings {
            composition: Composition::Spongiform,
            ..Default::default()
        };
        let result = calculate_acr_tirads(&plain);
        assert_eq!(result.points, 0);
        assert_eq!(result.tr_level, TrLevel::TR1);
        assert_eq!(result.point_breakdown.echogenicity.value, Echogenicity::Isoechoic);
        assert_eq!(result.point_breakdown.echogenicity.points, 0);

        let with_foci = Findings {
            composition: Composition::Spongiform,
            echogenicity: Echogenicity::Hypoechoic,
            echogenic_foci: EchogenicFoci::Microcalcifications,
            ..Default::default()
        };
        assert_eq!(calculate_acr_tirads(&with_foci).points, 0);
    }

    #[test]
    fn solid_hypoechoic_smooth_nodule_is_tr4() {
        let findings = Findings {
            composition: Composition::Solid,
            echogenicity: Echogenicity::Hypoechoic,
            ..Default::default()
        };
        let result = calculate_acr_tirads(&findings);
        assert_eq!(result.points, 4);
        assert_eq!(result.tr_level, TrLevel::TR4);
        assert_eq!(result.point_breakdown.composition.points, 2);
        assert_eq!(result.point_breakdown.echogenicity.points, 2);
    }

    #[test]
    fn extrathyroidal_extension_scores_three() {
        assert_eq!(margin_points(Margin::ExtrathyroidalExtension), 3);
        assert_eq!(margin_points(Margin::IllDefined), 0);
    }

    #[test]
    fn tier_bands() {
        let expected = [
            (0, TrLevel::TR1),
            (1, TrLevel::TR2),
            (2, TrLevel::TR2),
            (3, TrLevel::TR3),
            (4, TrLevel::TR4),
            (6, TrLevel::TR4),
            (7, TrLevel::TR5),
            (14, TrLevel::TR5),
        ];
        for (points, level) in expected {
            assert_eq!(TrLevel::from_points(points), level, "points = {points}");
        }
    }

    #[test]
    fn breakdown_serializes_chosen_values() {
        let result = calculate_acr_tirads(&Findings::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["tr_level"], "TR3");
        assert_eq!(json["point_breakdown"]["composition"]["value"], "solid");
        assert_eq!(json["point_breakdown"]["composition"]["points"], 2);
        assert_eq!(json["point_breakdown"]["echogenicity"]["value"], "isoechoic");
    }

    proptest! {
        #[test]
        fn total_is_sum_of_category_lookups(findings in any_findings()) {
            let result = calculate_acr_tirads(&findings);
            let expected = if findings.composition == Composition::Spongiform {
                0
            } else {
                composition_points(findings.composition)
                    + echogenicity_points(findings.echogenicity)
                    + shape_points(findings.shape)
                    + margin_points(findings.margin)
                    + echogenic_foci_points(findings.echogenic_foci)
            };
            prop_assert_eq!(result.points, expected);
            prop_assert_eq!(result.points, result.point_breakdown.total());
            prop_assert_eq!(result.tr_level, TrLevel::from_points(result.points));
        }

        #[test]
        fn tier_is_monotonic_in_points(a in 0u32..20, b in 0u32..20) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(TrLevel::from_points(low) <= TrLevel::from_points(high));
        }
    }
}
