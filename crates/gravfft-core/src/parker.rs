//! Parker's series for the potential field of an undulating density interface.
//!
//! The spectrum of the field is a sum over orders `n = 1..N`:
//!
//! $$ F(k) = \sum_n \frac{2\pi G \rho}{n!} e^{-|k| z_0} |k|^{n-1} \mathcal{F}[h^n] \, W(k) $$
//!
//! where `W(k)` converts the gravity anomaly into the requested field.
//! Each order contributes through a [`SpectralKernel`]; the plain Parker
//! kernel lives here, the admittance-filtered kernels in
//! [`crate::admittance::theoretical`].

use gravfft_compute::{ComputeBackend, ComputeError};
use ndarray::{Array2, Zip};
use num_complex::Complex64;

use crate::constants::{EOTVOS_PER_MGAL_PER_M, MGAL_PER_MS2, MICRORADIANS, NEWTON_G};
use crate::params::FieldType;
use crate::wavenumber::{BinGeometry, WavenumberGrid};

/// Converts a gravity anomaly spectrum into another field at one bin.
///
/// The second argument is normal gravity in mGal.
pub type FieldTransfer = fn(&BinGeometry, f64) -> Complex64;

fn free_air(_: &BinGeometry, _: f64) -> Complex64 {
    Complex64::new(1.0, 0.0)
}

fn geoid(bin: &BinGeometry, g45: f64) -> Complex64 {
    if bin.mk > 0.0 {
        Complex64::new(1.0 / (g45 * bin.mk), 0.0)
    } else {
        Complex64::new(0.0, 0.0)
    }
}

fn vertical_gradient(bin: &BinGeometry, _: f64) -> Complex64 {
    Complex64::new(EOTVOS_PER_MGAL_PER_M * bin.mk, 0.0)
}

/// Horizontal derivative of the geoid along wavenumber component `k`.
fn deflection(k: f64, mk: f64, g45: f64) -> Complex64 {
    if mk > 0.0 {
        Complex64::new(0.0, -k * MICRORADIANS / (g45 * mk))
    } else {
        Complex64::new(0.0, 0.0)
    }
}

fn east_deflection(bin: &BinGeometry, g45: f64) -> Complex64 {
    deflection(bin.kx, bin.mk, g45)
}

fn north_deflection(bin: &BinGeometry, g45: f64) -> Complex64 {
    deflection(bin.ky, bin.mk, g45)
}

impl FieldType {
    /// The per-bin conversion for this field, chosen once per run.
    pub fn transfer(self) -> FieldTransfer {
        match self {
            Self::FreeAir => free_air,
            Self::Geoid => geoid,
            Self::Vgg => vertical_gradient,
            Self::EastDeflection => east_deflection,
            Self::NorthDeflection => north_deflection,
        }
    }
}

/// `n!` as a float.
pub fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// `|k|^(n-1)`, with the first two orders spelled out.
pub fn radial_power(mk: f64, order: u32) -> f64 {
    match order {
        0 | 1 => 1.0,
        2 => mk,
        n => mk.powi(n as i32 - 1),
    }
}

/// Constant factor `1e5·2πGρ / n!` of the n-th Parker term, in mGal per m^n.
pub fn parker_coefficient(order: u32, density: f64) -> f64 {
    MGAL_PER_MS2 * 2.0 * std::f64::consts::PI * NEWTON_G * density / factorial(order)
}

/// Weight applied to the spectrum of `h^n` at one bin.
pub trait SpectralKernel: Send + Sync {
    fn weight(&self, order: u32, bin: &BinGeometry) -> Complex64;
}

/// Parker's kernel for a layer of constant density contrast at depth `z_level`.
#[derive(Clone, Copy)]
pub struct ParkerKernel {
    pub density: f64,
    pub z_level: f64,
    pub mgal_at_45: f64,
    pub field: FieldTransfer,
}

impl ParkerKernel {
    pub fn new(field: FieldType, density: f64, z_level: f64, mgal_at_45: f64) -> Self {
        Self {
            density,
            z_level,
            mgal_at_45,
            field: field.transfer(),
        }
    }
}

impl SpectralKernel for ParkerKernel {
    fn weight(&self, order: u32, bin: &BinGeometry) -> Complex64 {
        let v = parker_coefficient(order, self.density)
            * (-bin.mk * self.z_level).exp()
            * radial_power(bin.mk, order);
        (self.field)(bin, self.mgal_at_45) * v
    }
}

/// Add the order-`order` term `kernel · term` into `acc`.
pub fn accumulate_term(
    backend: &dyn ComputeBackend,
    kernel: &dyn SpectralKernel,
    order: u32,
    wavenumbers: &WavenumberGrid,
    term: &Array2<Complex64>,
    acc: &mut Array2<Complex64>,
) -> Result<(), ComputeError> {
    let weights = backend.parallel_grid_fill(wavenumbers.ny2(), wavenumbers.nx2(), &|row, col| {
        kernel.weight(order, &wavenumbers.bin(row, col))
    })?;
    Zip::from(acc)
        .and(&weights)
        .and(term)
        .for_each(|a, &w, &t| *a += w * t);
    Ok(())
}
