//! # gravfft Core
//!
//! Spectral-domain potential-field modelling of gridded topography. This
//! crate computes gravity, geoid, vertical gravity gradient and deflection
//! of the vertical from topography with Parker's series, models flexural
//! isostatic compensation, and estimates admittance and coherence between
//! topography and an observed field.
//!
//! ## Architecture
//!
//! Every operation runs through [`engine::GravityEngine`], which prepares the
//! input grids ([`spectrum`]), transforms them and applies per-bin kernels
//! implementing [`parker::SpectralKernel`] on a
//! [`gravfft_compute::ComputeBackend`].
//!
//! ## Modules
//!
//! - [`constants`]: Physical constants and rigidity conversions.
//! - [`grid`]: Grid container, NaN handling and co-registration.
//! - [`params`]: Model parameters and validation.
//! - [`wavenumber`]: Wavenumber lattice and radial bins.
//! - [`spectrum`]: Detrending, padding, tapering and 2-D transforms.
//! - [`parker`]: Parker's series and per-field transfer functions.
//! - [`isostasy`]: Flexural and Airy compensation.
//! - [`admittance`]: Observed and theoretical admittance/coherence.
//! - [`engine`]: Forward, cross-spectral and theory operations.

pub mod admittance;
pub mod constants;
pub mod engine;
pub mod grid;
pub mod isostasy;
pub mod params;
pub mod parker;
pub mod spectrum;
pub mod wavenumber;

pub use engine::{Diagnostic, EngineError, ForwardOutput, GravityEngine, SpectralOutput};
pub use grid::Grid;
pub use params::{FieldType, ForwardProduct, ModelParameters, ValidationError};
