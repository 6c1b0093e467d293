//! Closed-form admittance of an elastic plate (McNutt & Shure, 1986).
//!
//! With `f` the frequency in cycles per metre, `α = (2π)⁴ D / (g Δρ_mc)` and
//! `t₁ = 2πG · C(f)` (×1e5 for mGal, or ÷ `g·2πf` for the geoid):
//!
//! - loading from top:
//!   `Z(f) = t₁ ρ_cw (e^{−2πf z₀} − e^{−2πf z_m} / (1 + α f⁴))`
//! - loading from below:
//!   `Z(f) = t₁ (ρ_cw e^{−2πf z₀} + ρ_mc e^{−2πf z_m} − (ρ_mw + ρ_mc α f⁴) e^{−2πf z_l})`
//!
//! `C(f)` is 1 on a flat earth, `2Rf / (4πRf + 1)` on a sphere.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::constants::{EARTH_RADIUS, MGAL_PER_MS2, NEWTON_G};
use crate::params::{EarthGeometry, FieldType, ModelParameters, ValidationError};
use crate::parker::{factorial, radial_power, SpectralKernel};
use crate::wavenumber::{BinGeometry, RadialBins};

use super::LoadDirection;

/// Earth-curvature factor at frequency `f` (cycles/m).
pub fn earth_curvature(geometry: EarthGeometry, f: f64) -> f64 {
    match geometry {
        EarthGeometry::Flat => 1.0,
        EarthGeometry::Spherical => {
            2.0 * EARTH_RADIUS * f / (4.0 * PI * EARTH_RADIUS * f + 1.0)
        }
    }
}

/// Parameters of the plate model, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TheoreticalAdmittance {
    field: FieldType,
    geometry: EarthGeometry,
    gravity_ms2: f64,
    alpha: f64,
    rho_cw: f64,
    rho_mc: f64,
    rho_mw: f64,
    z_level: f64,
    moho: f64,
    swell: f64,
}

impl TheoreticalAdmittance {
    /// Resolve the model for topography observed at mean depth `z_level`.
    ///
    /// The swell depth is only needed for loading from below and defaults
    /// to the Moho depth otherwise.
    pub fn new(params: &ModelParameters, z_level: f64) -> Result<Self, ValidationError> {
        if !params.field.has_theoretical_admittance() {
            return Err(ValidationError::UnsupportedField {
                field: params.field,
                context: "Theoretical admittance",
            });
        }
        let flexure = params.require_flexure("theoretical admittance")?;
        let moho = params.require_moho("theoretical admittance")?;
        let swell = params.depths.swell.unwrap_or(moho);
        let gravity_ms2 = params.gravity.ms2();
        let rho_mc = flexure.rho_mc();
        Ok(Self {
            field: params.field,
            geometry: params.geometry,
            gravity_ms2,
            alpha: (2.0 * PI).powi(4) * flexure.rigidity() / (gravity_ms2 * rho_mc),
            rho_cw: flexure.rho_cw(),
            rho_mc,
            rho_mw: flexure.rho_mw(),
            z_level,
            moho,
            swell,
        })
    }

    /// `2πG·C(f)` in the output units. Zero at `f = 0` for the geoid.
    fn scale(&self, f: f64) -> f64 {
        let t1 = earth_curvature(self.geometry, f) * 2.0 * PI * NEWTON_G;
        match self.field {
            FieldType::Geoid if f > 0.0 => t1 / (self.gravity_ms2 * f * 2.0 * PI),
            FieldType::Geoid => 0.0,
            _ => t1 * MGAL_PER_MS2,
        }
    }

    pub fn from_top(&self, f: f64) -> f64 {
        let decay = |z: f64| (-2.0 * PI * f * z).exp();
        let t2 = decay(self.z_level) - decay(self.moho) / (1.0 + self.alpha * f.powi(4));
        self.scale(f) * self.rho_cw * t2
    }

    pub fn from_below(&self, f: f64) -> f64 {
        let decay = |z: f64| (-2.0 * PI * f * z).exp();
        let t2 = self.rho_cw * decay(self.z_level) + self.rho_mc * decay(self.moho);
        let t3 = -(self.rho_mw + self.rho_mc * f.powi(4) * self.alpha) * decay(self.swell);
        self.scale(f) * (t2 + t3)
    }

    pub fn evaluate(&self, direction: LoadDirection, f: f64) -> f64 {
        match direction {
            LoadDirection::FromTop => self.from_top(f),
            LoadDirection::FromBelow => self.from_below(f),
        }
    }

    /// Curve sampled at the centre frequency of every radial bin.
    pub fn curve(&self, direction: LoadDirection, bins: &RadialBins) -> Vec<f64> {
        (0..bins.count)
            .map(|k| self.evaluate(direction, bins.frequency(k)))
            .collect()
    }
}

/// Predicts a field from topography through a theoretical admittance.
#[derive(Debug, Clone, Copy)]
pub struct LoadKernel {
    pub model: TheoreticalAdmittance,
    pub direction: LoadDirection,
}

impl SpectralKernel for LoadKernel {
    fn weight(&self, order: u32, bin: &BinGeometry) -> Complex64 {
        if bin.mk == 0.0 {
            return Complex64::new(0.0, 0.0);
        }
        let f = bin.mk / (2.0 * PI);
        let v = self.model.evaluate(self.direction, f) * radial_power(f, order) / factorial(order);
        Complex64::new(v, 0.0)
    }
}
