//! Flexural isostatic compensation of a topographic load.
//!
//! The load spectrum `H(k)` is turned into the deflection of the
//! compensating interface by the transfer function
//!
//! $$ T(k) = \frac{-A (\rho_l - \rho_w) / (\rho_m - \rho_l)}{D k^4 / ((\rho_m - \rho_l) g) + 1} $$
//!
//! A zero elastic thickness is the local (Airy) limit: the spectrum is left
//! untouched and the constant ratio is applied in the space domain instead.

use gravfft_compute::{ComputeBackend, ComputeError};
use ndarray::{Array2, Zip};
use num_complex::Complex64;

use crate::params::{FlexureParams, NormalGravity};
use crate::wavenumber::WavenumberGrid;

/// Result of compensating a load spectrum.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Deflection spectrum of an elastic plate.
    Flexural(Array2<Complex64>),
    /// Local compensation: the untouched spectrum and the space-domain
    /// scale that turns its inverse into the deflection.
    Airy {
        spectrum: Array2<Complex64>,
        scale: f64,
    },
}

impl Compensation {
    /// The spectrum to invert and the factor to apply afterwards.
    pub fn into_parts(self) -> (Array2<Complex64>, f64) {
        match self {
            Self::Flexural(spectrum) => (spectrum, 1.0),
            Self::Airy { spectrum, scale } => (spectrum, scale),
        }
    }
}

/// Isostatic response of a thin elastic plate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsostaticResponse {
    rigidity: f64,
    airy_ratio: f64,
    /// `D / ((ρm − ρload)·g)` in m⁴.
    restoring: f64,
}

impl IsostaticResponse {
    pub fn new(flexure: &FlexureParams, gravity: &NormalGravity) -> Self {
        let (rho_load, amplitude) = match flexure.approximate_infill() {
            Some(rho_infill) => (
                rho_infill,
                ((flexure.rho_mantle - rho_infill) / (flexure.rho_mantle - flexure.rho_load)).sqrt(),
            ),
            None => (flexure.rho_load, 1.0),
        };
        let rigidity = flexure.rigidity();
        let airy_ratio =
            -amplitude * (rho_load - flexure.rho_water) / (flexure.rho_mantle - rho_load);
        let restoring = rigidity / ((flexure.rho_mantle - rho_load) * gravity.ms2());
        Self {
            rigidity,
            airy_ratio,
            restoring,
        }
    }

    pub fn rigidity(&self) -> f64 {
        self.rigidity
    }

    /// Deflection per unit load under local compensation.
    pub fn airy_ratio(&self) -> f64 {
        self.airy_ratio
    }

    pub fn is_local(&self) -> bool {
        self.rigidity == 0.0
    }

    /// Spectral transfer function at radial wavenumber `mk`.
    pub fn transfer(&self, mk: f64) -> f64 {
        self.airy_ratio / (self.restoring * mk.powi(4) + 1.0)
    }

    /// Deflection spectrum of the load `spectrum`.
    pub fn compensate(
        &self,
        backend: &dyn ComputeBackend,
        mut spectrum: Array2<Complex64>,
        wavenumbers: &WavenumberGrid,
    ) -> Result<Compensation, ComputeError> {
        if self.is_local() {
            log::debug!("Zero elastic thickness: Airy compensation, ratio {:.4}", self.airy_ratio);
            return Ok(Compensation::Airy {
                spectrum,
                scale: self.airy_ratio,
            });
        }
        let transfer = backend.parallel_grid_fill(
            wavenumbers.ny2(),
            wavenumbers.nx2(),
            &|row, col| Complex64::new(self.transfer(wavenumbers.modk(row, col)), 0.0),
        )?;
        Zip::from(&mut spectrum)
            .and(&transfer)
            .for_each(|h, &t| *h *= t);
        Ok(Compensation::Flexural(spectrum))
    }
}
