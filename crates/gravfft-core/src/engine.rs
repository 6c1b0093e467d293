//! Orchestration of forward models, cross-spectral estimates and
//! theoretical curves.
//!
//! [`GravityEngine`] owns the compute backend and the FFT preparation
//! settings. Each operation validates its parameters, cleans the inputs,
//! prepares and transforms the grids, and hands the spectra to the
//! kernels in [`crate::parker`], [`crate::isostasy`] and
//! [`crate::admittance`]. Inputs are never modified; every stage produces a
//! new buffer.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use gravfft_compute::backend::try_zeroed;
use gravfft_compute::{ComputeBackend, ComputeError, SerialBackend};
use ndarray::Array2;
use num_complex::Complex64;
use serde::Serialize;
use thiserror::Error;

use crate::admittance::{
    AdmittanceResult, AdmittanceRow, CrossSpectrum, CurvePoint, LoadDirection, LoadKernel,
    SpectralRequest, TheoreticalAdmittance, TheoreticalCurve, TheoryRequest,
};
use crate::constants::{MGAL_PER_MS2, NEWTON_G};
use crate::grid::Grid;
use crate::isostasy::IsostaticResponse;
use crate::params::{Adjustment, ForwardProduct, ModelParameters, TermPolicy, ValidationError};
use crate::parker::{accumulate_term, ParkerKernel, SpectralKernel};
use crate::spectrum::{forward_fft, inverse_fft, try_mapv, FftSettings, PreparedGrid, TrendMode};
use crate::wavenumber::WavenumberGrid;

/// Errors that abort an operation. No output is produced.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}

/// Non-fatal conditions met while running an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Diagnostic {
    /// NaN samples of an input grid were replaced by `fallback`.
    NansReplaced {
        grid: &'static str,
        count: usize,
        fallback: f64,
    },
    /// The Parker order was reduced for an admittance-filtered prediction.
    TermsClamped { requested: u32, used: u32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NansReplaced {
                grid,
                count,
                fallback,
            } => write!(f, "replaced {count} NaN sample(s) in the {grid} grid with {fallback}"),
            Self::TermsClamped { requested, used } => write!(
                f,
                "Parker expansion order reduced from {requested} to {used} for an admittance-filtered prediction"
            ),
        }
    }
}

/// A forward-modelled grid.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    pub grid: Grid,
    /// Parker order actually evaluated (0 for the flexural surface).
    pub terms: u32,
    /// Depth of the modelled interface below the observation level (m).
    pub z_level: f64,
    pub diagnostics: Vec<Diagnostic>,
}

/// An admittance or coherence table.
#[derive(Debug, Clone)]
pub struct SpectralOutput {
    pub result: AdmittanceResult,
    pub z_level: f64,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the spectral operations on a compute backend.
pub struct GravityEngine {
    backend: Arc<dyn ComputeBackend>,
    fft: FftSettings,
}

impl Default for GravityEngine {
    fn default() -> Self {
        #[cfg(feature = "cpu")]
        let backend: Arc<dyn ComputeBackend> = Arc::new(gravfft_compute::CpuBackend::new());
        #[cfg(not(feature = "cpu"))]
        let backend: Arc<dyn ComputeBackend> = Arc::new(SerialBackend);
        Self::new(backend)
    }
}

fn replace_nans(
    grid: &Grid,
    name: &'static str,
    fallback: f64,
    diagnostics: &mut Vec<Diagnostic>,
) -> Grid {
    let (clean, count) = grid.with_nans_replaced(fallback);
    if count > 0 {
        log::warn!("Replaced {count} NaN sample(s) in the {name} grid with {fallback}");
        diagnostics.push(Diagnostic::NansReplaced {
            grid: name,
            count,
            fallback,
        });
    }
    clean
}

fn try_zero_spectrum(wavenumbers: &WavenumberGrid) -> Result<Array2<Complex64>, ComputeError> {
    let (rows, cols) = (wavenumbers.ny2(), wavenumbers.nx2());
    Array2::from_shape_vec((rows, cols), try_zeroed::<Complex64>(rows * cols)?)
        .map_err(|e| ComputeError::DeviceError(e.to_string()))
}

impl GravityEngine {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        log::debug!("Compute backend: {}", backend.device_info().name);
        Self {
            backend,
            fft: FftSettings::default(),
        }
    }

    /// Single-threaded engine.
    pub fn serial() -> Self {
        Self::new(Arc::new(SerialBackend))
    }

    pub fn with_fft(mut self, fft: FftSettings) -> Self {
        self.fft = fft;
        self
    }

    pub fn fft_settings(&self) -> &FftSettings {
        &self.fft
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    /// Forward-model `product` from `topography`, optionally with a
    /// co-registered grid of density contrasts.
    pub fn forward(
        &self,
        params: &ModelParameters,
        product: ForwardProduct,
        topography: &Grid,
        density: Option<&Grid>,
    ) -> Result<ForwardOutput, EngineError> {
        params.validate_forward(product, density.is_some())?;
        if let Some(rho) = density {
            topography.ensure_co_registered(rho, "Topography and density")?;
        }

        let mut diagnostics = Vec::new();
        let mut topo = replace_nans(topography, "topography", 0.0, &mut diagnostics);
        let rho_grid = match (product, density) {
            (ForwardProduct::Anomaly, Some(rho)) => {
                let fallback = rho.z_range().map_or(0.0, |(lo, _)| lo);
                Some(replace_nans(rho, "density", fallback, &mut diagnostics))
            }
            (_, Some(_)) => {
                log::warn!("Density grid ignored: {product:?} uses the model densities");
                None
            }
            (_, None) => None,
        };

        if params.water_depth != 0.0 {
            log::info!("Remove {} m from topography grid", params.water_depth);
            topo = topo.offset(-params.water_depth);
        }

        let policy = TermPolicy::for_product(product, params.terms);
        if policy.is_clamped() {
            log::warn!(
                "{product:?} is a first-order model; using 1 Parker term instead of {}",
                policy.requested
            );
            diagnostics.push(Diagnostic::TermsClamped {
                requested: policy.requested,
                used: policy.used,
            });
        }

        let prepared = self.fft.prepare(&topo)?;
        let wavenumbers = prepared.wavenumbers;
        let mut z_level = prepared.level.abs();
        log::info!("Level used for upward continuation: {z_level}");

        let g45 = params.gravity.mgal();
        let mut deflected: Option<Array2<f64>> = None;
        let mut weights: Option<Array2<f64>> = None;
        let kernel: Box<dyn SpectralKernel> = match product {
            ForwardProduct::Anomaly => match &rho_grid {
                Some(rho) => {
                    let padded = self.fft.with_trend(TrendMode::None).prepare(rho)?;
                    weights = Some(padded.data);
                    Box::new(ParkerKernel::new(params.field, 1.0, z_level, g45))
                }
                None => {
                    let density = params.density.unwrap_or_default();
                    Box::new(ParkerKernel::new(params.field, density, z_level, g45))
                }
            },
            ForwardProduct::Flexure | ForwardProduct::Moho => {
                let flexure = params.require_flexure("isostatic compensation")?;
                let deflection = self.deflection(params, &prepared)?;
                if product == ForwardProduct::Flexure {
                    let moho = params.depths.moho.unwrap_or(0.0);
                    let mut grid = topography.with_data(prepared.interior(&deflection).mapv(|w| w - moho));
                    grid.header.title = "Flexural surface".into();
                    grid.header.z_units = "meter".into();
                    grid.header.remark = format!("Elastic thickness {} m", flexure.elastic_thickness());
                    return Ok(ForwardOutput {
                        grid,
                        terms: 0,
                        z_level,
                        diagnostics,
                    });
                }
                deflected = Some(deflection);
                z_level = params.require_moho("the Moho effect")?;
                Box::new(ParkerKernel::new(params.field, flexure.rho_mc(), z_level, g45))
            }
            ForwardProduct::TopLoad | ForwardProduct::BottomLoad => {
                let direction = if product == ForwardProduct::TopLoad {
                    LoadDirection::FromTop
                } else {
                    LoadDirection::FromBelow
                };
                Box::new(LoadKernel {
                    model: TheoreticalAdmittance::new(params, z_level)?,
                    direction,
                })
            }
        };

        let base = deflected.as_ref().unwrap_or(&prepared.data);
        let mut acc = try_zero_spectrum(&wavenumbers)?;
        for order in 1..=policy.used {
            log::info!("Evaluating Parker for term = {order}");
            let mut raised = try_mapv(base, |h| h.powi(order as i32))?;
            if let Some(rho) = &weights {
                raised *= rho;
            }
            let term = forward_fft(&raised)?;
            accumulate_term(self.backend(), kernel.as_ref(), order, &wavenumbers, &term, &mut acc)?;
        }
        let field = prepared.interior(&inverse_fft(&acc)?);

        let mut grid = topography.with_data(field);
        if params.adjustment != Adjustment::None {
            let rho = match product {
                ForwardProduct::Anomaly => match &rho_grid {
                    Some(rho) => rho.z_range().map_or(0.0, |(lo, _)| lo),
                    None => params.density.unwrap_or_default(),
                },
                ForwardProduct::Moho => params.require_flexure("slab")?.rho_mc(),
                _ => params.require_flexure("slab")?.rho_cw(),
            };
            grid = apply_adjustment(grid, params.adjustment, rho, params.water_depth, z_level);
        }
        grid.header.title = params.field.title().into();
        grid.header.z_units = params.field.units().into();
        grid.header.remark = format!("Parker expansion of order {}", policy.used);

        Ok(ForwardOutput {
            grid,
            terms: policy.used,
            z_level,
            diagnostics,
        })
    }

    /// Padded deflection of the compensating surface under the prepared load.
    fn deflection(
        &self,
        params: &ModelParameters,
        prepared: &PreparedGrid,
    ) -> Result<Array2<f64>, EngineError> {
        let flexure = params.require_flexure("isostatic compensation")?;
        let response = IsostaticResponse::new(flexure, &params.gravity);
        log::info!("Flexural rigidity: {:.4e} N m", response.rigidity());
        let spectrum = forward_fft(&prepared.data)?;
        let (spectrum, scale) = response
            .compensate(self.backend(), spectrum, &prepared.wavenumbers)?
            .into_parts();
        let mut deflection = inverse_fft(&spectrum)?;
        if scale != 1.0 {
            deflection.mapv_inplace(|w| w * scale);
        }
        Ok(deflection)
    }

    /// Radially averaged admittance or coherence between `topography` and
    /// a co-registered `field` grid.
    pub fn cross_spectrum(
        &self,
        params: &ModelParameters,
        request: &SpectralRequest,
        topography: &Grid,
        field: &Grid,
    ) -> Result<SpectralOutput, EngineError> {
        params.validate_spectral(request)?;
        topography.ensure_co_registered(field, "Topography and field")?;

        let mut diagnostics = Vec::new();
        let mut topo = replace_nans(topography, "topography", 0.0, &mut diagnostics);
        let field = replace_nans(field, "field", 0.0, &mut diagnostics);
        if params.water_depth != 0.0 {
            log::info!("Remove {} m from topography grid", params.water_depth);
            topo = topo.offset(-params.water_depth);
        }

        let prep_a = self.fft.prepare(&topo)?;
        let prep_b = self.fft.prepare(&field)?;
        let z_level = prep_a.level.abs();
        let wavenumbers = prep_a.wavenumbers;

        let spectrum_a = forward_fft(&prep_a.data)?;
        let spectrum_b = forward_fft(&prep_b.data)?;
        let cross = CrossSpectrum::accumulate(&spectrum_a, &spectrum_b, &wavenumbers);

        let theory = match request.theory {
            Some(direction) => {
                let model = TheoreticalAdmittance::new(params, z_level)?;
                Some(model.curve(direction, &cross.bins))
            }
            None => None,
        };

        let rows = cross
            .estimate(request.quantity)
            .into_iter()
            .enumerate()
            .map(|(k, (value, error))| AdmittanceRow {
                frequency: request.axis.value(cross.bins.frequency(k)),
                value,
                error,
                theoretical: theory.as_ref().map(|t| t[k]),
            })
            .collect::<Vec<_>>();
        let empty = cross.counts.iter().filter(|&&n| n == 0).count();
        if empty > 0 {
            log::warn!("{empty} radial bin(s) have no samples and are reported as NaN");
        }

        Ok(SpectralOutput {
            result: AdmittanceResult {
                quantity: request.quantity,
                axis: request.axis,
                direction: request.theory,
                rows,
            },
            z_level,
            diagnostics,
        })
    }

    /// Theoretical admittance over an equidistant frequency axis, without data.
    pub fn theoretical_curve(
        &self,
        params: &ModelParameters,
        request: &TheoryRequest,
    ) -> Result<TheoreticalCurve, EngineError> {
        params.validate_theory(request)?;
        let delta_k = 2.0 * PI / (request.points as f64 * request.spacing);
        let n2 = request.points * 2;
        let bins = WavenumberGrid::from_increments(n2, n2, delta_k, delta_k).radial_bins();
        let model = TheoreticalAdmittance::new(params, request.mean_depth)?;
        let points = model
            .curve(request.direction, &bins)
            .into_iter()
            .enumerate()
            .map(|(k, value)| CurvePoint {
                frequency: request.axis.value(bins.frequency(k)),
                value,
            })
            .collect();
        Ok(TheoreticalCurve {
            direction: request.direction,
            axis: request.axis,
            points,
        })
    }
}

/// Slab, Bouguer or far-field adjustment of a free-air anomaly grid.
pub fn apply_adjustment(
    grid: Grid,
    adjustment: Adjustment,
    density: f64,
    water_depth: f64,
    z_level: f64,
) -> Grid {
    let slab = MGAL_PER_MS2 * 2.0 * PI * density * NEWTON_G * (water_depth - z_level);
    match adjustment {
        Adjustment::None => grid,
        Adjustment::Slab => {
            log::info!("Add {slab} mGal to predicted FAA grid to account for implied slab");
            let data = grid.data.mapv(|v| v + slab);
            grid.with_data(data)
        }
        Adjustment::Bouguer => {
            log::info!("Complete Bouguer anomaly with a slab of {slab} mGal");
            let data = grid.data.mapv(|v| slab - v);
            grid.with_data(data)
        }
        Adjustment::Zero => {
            let far_field = grid.corner_mean();
            log::info!("Subtract {far_field} mGal from predicted FAA grid to force far-field to be zero");
            grid.offset(-far_field)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_adjustments() {
        let g = Grid::with_spacing(array![[1.0, 2.0], [3.0, 6.0]], 1.0, 1.0);
        let slab = 1e5 * 2.0 * PI * 1000.0 * NEWTON_G * 100.0;
        let s = apply_adjustment(g.clone(), Adjustment::Slab, 1000.0, 100.0, 0.0);
        assert_relative_eq!(s.data[[0, 0]], 1.0 + slab);
        let b = apply_adjustment(g.clone(), Adjustment::Bouguer, 1000.0, 100.0, 0.0);
        assert_relative_eq!(b.data[[1, 1]], slab - 6.0);
        let z = apply_adjustment(g, Adjustment::Zero, 1000.0, 100.0, 0.0);
        assert_relative_eq!(z.data[[0, 0]], -2.0);
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::TermsClamped {
            requested: 3,
            used: 1,
        };
        assert!(d.to_string().contains("from 3 to 1"));
    }
}
