//! Cálculo de tamaño del nódulo: dimensión máxima y volumen elipsoidal.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeMode {
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

/// Medidas del nódulo en milímetros.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeMeasurement {
    #[serde(default)]
    pub mode: SizeMode,
    pub a_mm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_mm: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeResult {
    pub mode: SizeMode,
    pub a_mm: f64,
    pub b_mm: Option<f64>,
    pub c_mm: Option<f64>,
    pub volume_mm3: Option<f64>,
    pub max_dimension_mm: f64,
}

impl SizeMeasurement {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("size.a_mm", Some(self.a_mm)),
            ("size.b_mm", self.b_mm),
            ("size.c_mm", self.c_mm),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(ValidationError::new(field, "debe ser un número mayor que 0"));
                }
            }
        }

        match self.mode {
            SizeMode::TwoD if self.c_mm.is_some() => Err(ValidationError::new(
                "size.c_mm",
                "el modo 2d no admite una tercera dimensión",
            )),
            SizeMode::ThreeD if self.dimensions().count() < 2 => Err(ValidationError::new(
                "size",
                "el modo 3d requiere al menos dos dimensiones",
            )),
            _ => Ok(()),
        }
    }

    fn dimensions(&self) -> impl Iterator<Item = f64> {
        [Some(self.a_mm), self.b_mm, self.c_mm].into_iter().flatten()
    }
}

/// Volumen de un elipsoide de ejes `a`, `b`, `c`: (π/6)·a·b·c.
pub fn ellipsoid_volume(a: f64, b: f64, c: f64) -> f64 {
    PI / 6.0 * a * b * c
}

pub fn calculate_size(size: &SizeMeasurement) -> Result<SizeResult, ValidationError> {
    size.validate()?;

    let max_dimension_mm = size.dimensions().fold(f64::MIN, f64::max);

    let volume_mm3 = match (size.mode, size.b_mm, size.c_mm) {
        (SizeMode::ThreeD, Some(b), Some(c)) => Some(ellipsoid_volume(size.a_mm, b, c)),
        _ => None,
    };

    Ok(SizeResult {
        mode: size.mode,
        a_mm: size.a_mm,
        b_mm: size.b_mm,
        c_mm: size.c_mm,
        volume_mm3,
        max_dimension_mm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(mode: SizeMode, a: f64, b: Option<f64>, c: Option<f64>) -> SizeMeasurement {
        SizeMeasurement { mode, a_mm: a, b_mm: b, c_mm: c }
    }

    #[test]
    fn three_d_volume_and_max_dimension() {
        let result = calculate_size(&measurement(SizeMode::ThreeD, 10.0, Some(8.0), Some(6.0))).unwrap();
        assert_eq!(result.max_dimension_mm, 10.0);
        let volume = result.volume_mm3.unwrap();
        assert!((volume - 251.327).abs() < 0.01, "volume = {volume}");
        assert_eq!(volume, ellipsoid_volume(10.0, 8.0, 6.0));
    }

    #[test]
    fn two_d_has_no_volume() {
        let result = calculate_size(&measurement(SizeMode::TwoD, 15.0, Some(18.0), None)).unwrap();
        assert_eq!(result.max_dimension_mm, 18.0);
        assert!(result.volume_mm3.is_none());
    }

    #[test]
    fn three_d_with_two_dimensions_has_no_volume() {
        let result = calculate_size(&measurement(SizeMode::ThreeD, 9.0, Some(12.0), None)).unwrap();
        assert_eq!(result.max_dimension_mm, 12.0);
        assert!(result.volume_mm3.is_none());
    }

    #[test]
    fn three_d_needs_two_dimensions() {
        let err = calculate_size(&measurement(SizeMode::ThreeD, 9.0, None, None)).unwrap_err();
        assert_eq!(err.field, "size");
    }

    #[test]
    fn three_d_accepts_any_two_dimensions() {
        let result = calculate_size(&measurement(SizeMode::ThreeD, 10.0, None, Some(5.0))).unwrap();
        assert_eq!(result.max_dimension_mm, 10.0);
        assert!(result.volume_mm3.is_none());
        assert_eq!(result.c_mm, Some(5.0));
    }

    #[test]
    fn two_d_rejects_third_dimension() {
        let err = calculate_size(&measurement(SizeMode::TwoD, 9.0, Some(4.0), Some(3.0))).unwrap_err();
        assert_eq!(err.field, "size.c_mm");
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        assert_eq!(
            calculate_size(&measurement(SizeMode::TwoD, 0.0, None, None)).unwrap_err().field,
            "size.a_mm"
        );
        assert_eq!(
            calculate_size(&measurement(SizeMode::ThreeD, 4.0, Some(-1.0), Some(2.0)))
                .unwrap_err()
                .field,
            "size.b_mm"
        );
        assert!(calculate_size(&measurement(SizeMode::TwoD, f64::NAN, None, None)).is_err());
    }

    #[test]
    fn mode_uses_lowercase_wire_names() {
        let size: SizeMeasurement =
            serde_json::from_str(r#"{"mode":"3d","a_mm":1,"b_mm":2,"c_mm":3}"#).unwrap();
        assert_eq!(size.mode, SizeMode::ThreeD);
        assert_eq!(serde_json::to_value(SizeMode::TwoD).unwrap(), "2d");
    }
}
