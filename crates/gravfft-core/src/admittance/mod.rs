//! Admittance and coherence between topography and a potential field.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`estimator`] | Radially averaged cross-spectra of two observed grids |
//! | [`theoretical`] | Closed-form "loading from top" and "loading from below" curves |

pub mod estimator;
pub mod theoretical;

use serde::{Deserialize, Serialize};

use crate::params::ValidationError;

pub use estimator::CrossSpectrum;
pub use theoretical::{LoadKernel, TheoreticalAdmittance};

/// Where the compensated load sits relative to the elastic plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadDirection {
    /// Load emplaced beneath the plate.
    FromBelow,
    /// Load on the surface of the plate.
    FromTop,
}

impl LoadDirection {
    /// At most one direction may be requested.
    pub fn from_flags(below: bool, top: bool) -> Result<Option<Self>, ValidationError> {
        match (below, top) {
            (true, true) => Err(ValidationError::ConflictingLoadDirections),
            (true, false) => Ok(Some(Self::FromBelow)),
            (false, true) => Ok(Some(Self::FromTop)),
            (false, false) => Ok(None),
        }
    }
}

/// Which cross-spectral ratio to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralQuantity {
    #[default]
    Admittance,
    Coherence,
}

/// Abscissa of a spectral table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyAxis {
    /// Report wavelength instead of frequency.
    #[serde(default)]
    pub wavelength: bool,
    /// Report per-kilometre frequency, or wavelength in kilometres.
    #[serde(default)]
    pub kilometres: bool,
}

impl FrequencyAxis {
    /// Convert a frequency in cycles per metre to the configured abscissa.
    pub fn value(&self, frequency: f64) -> f64 {
        let f = if self.kilometres {
            frequency * 1000.0
        } else {
            frequency
        };
        if self.wavelength {
            1.0 / f
        } else {
            f
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.wavelength, self.kilometres) {
            (false, false) => "frequency (1/m)",
            (false, true) => "frequency (1/km)",
            (true, false) => "wavelength (m)",
            (true, true) => "wavelength (km)",
        }
    }
}

/// What an admittance/coherence run estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpectralRequest {
    #[serde(default)]
    pub quantity: SpectralQuantity,
    /// Add a theoretical column for this load direction.
    #[serde(default)]
    pub theory: Option<LoadDirection>,
    #[serde(default)]
    pub axis: FrequencyAxis,
}

impl SpectralRequest {
    /// Build a request from independent switches, rejecting two load directions.
    pub fn from_flags(
        coherence: bool,
        below: bool,
        top: bool,
        axis: FrequencyAxis,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            quantity: if coherence {
                SpectralQuantity::Coherence
            } else {
                SpectralQuantity::Admittance
            },
            theory: LoadDirection::from_flags(below, top)?,
            axis,
        })
    }
}

/// A data-free theoretical curve over an equidistant frequency axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheoryRequest {
    pub direction: LoadDirection,
    /// Number of samples of the notional profile (and of output rows).
    pub points: usize,
    /// Sample spacing of the notional profile (m).
    pub spacing: f64,
    /// Mean observation depth of the topography (m).
    #[serde(default)]
    pub mean_depth: f64,
    #[serde(default)]
    pub axis: FrequencyAxis,
}

/// JSON has no NaN: empty bins travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// One radial bin of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmittanceRow {
    /// Frequency or wavelength, per the result's axis.
    pub frequency: f64,
    /// Admittance or coherence; NaN for a bin with no samples.
    #[serde(with = "nan_as_null")]
    pub value: f64,
    /// One-sigma error.
    #[serde(with = "nan_as_null")]
    pub error: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theoretical: Option<f64>,
}

/// Radially averaged admittance or coherence, one row per bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmittanceResult {
    pub quantity: SpectralQuantity,
    pub axis: FrequencyAxis,
    #[serde(default)]
    pub direction: Option<LoadDirection>,
    pub rows: Vec<AdmittanceRow>,
}

impl AdmittanceResult {
    /// 3, or 4 with a theoretical column.
    pub fn n_columns(&self) -> usize {
        if self.direction.is_some() {
            4
        } else {
            3
        }
    }
}

/// One sample of a theoretical curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub frequency: f64,
    pub value: f64,
}

/// A theoretical admittance curve without data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalCurve {
    pub direction: LoadDirection,
    pub axis: FrequencyAxis,
    pub points: Vec<CurvePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_conflicting_directions() {
        assert!(matches!(
            LoadDirection::from_flags(true, true),
            Err(ValidationError::ConflictingLoadDirections)
        ));
        assert_eq!(LoadDirection::from_flags(false, true).unwrap(), Some(LoadDirection::FromTop));
        assert!(SpectralRequest::from_flags(true, true, true, FrequencyAxis::default()).is_err());
    }

    #[test]
    fn test_axis_conversion() {
        let f = 1.0 / 50_000.0;
        let plain = FrequencyAxis::default();
        assert_relative_eq!(plain.value(f), f);
        let km = FrequencyAxis {
            wavelength: false,
            kilometres: true,
        };
        assert_relative_eq!(km.value(f), 0.02);
        let lambda_km = FrequencyAxis {
            wavelength: true,
            kilometres: true,
        };
        assert_relative_eq!(lambda_km.value(f), 50.0, max_relative = 1e-12);
        let lambda = FrequencyAxis {
            wavelength: true,
            kilometres: false,
        };
        assert_relative_eq!(lambda.value(f), 50_000.0, max_relative = 1e-12);
    }
}
