//! Radially averaged cross-spectral estimates between two transformed grids.

use ndarray::Array2;
use num_complex::Complex64;

use crate::wavenumber::{RadialBins, WavenumberGrid};

use super::SpectralQuantity;

/// Per-bin sums of auto-, co- and quadrature spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSpectrum {
    pub bins: RadialBins,
    pub power_a: Vec<f64>,
    pub power_b: Vec<f64>,
    pub co_spectrum: Vec<f64>,
    pub quadrature: Vec<f64>,
    pub counts: Vec<usize>,
}

impl CrossSpectrum {
    /// Bin every non-DC sample of `a` (topography) and `b` (field) by `|k|`.
    pub fn accumulate(
        a: &Array2<Complex64>,
        b: &Array2<Complex64>,
        wavenumbers: &WavenumberGrid,
    ) -> Self {
        let bins = wavenumbers.radial_bins();
        let nk = bins.count;
        let mut out = Self {
            bins,
            power_a: vec![0.0; nk],
            power_b: vec![0.0; nk],
            co_spectrum: vec![0.0; nk],
            quadrature: vec![0.0; nk],
            counts: vec![0; nk],
        };
        for (((row, col), za), zb) in a.indexed_iter().zip(b.iter()) {
            if row == 0 && col == 0 {
                continue;
            }
            let Some(k) = bins.index_of(wavenumbers.modk(row, col)) else {
                continue;
            };
            out.power_a[k] += za.norm_sqr();
            out.power_b[k] += zb.norm_sqr();
            out.co_spectrum[k] += zb.re * za.re + zb.im * za.im;
            out.quadrature[k] += za.im * zb.re - zb.im * za.re;
            out.counts[k] += 1;
        }
        out
    }

    /// Squared coherence of bin `k`; NaN when the bin is empty.
    pub fn coherence(&self, k: usize) -> f64 {
        if self.counts[k] == 0 {
            return f64::NAN;
        }
        let co = self.co_spectrum[k];
        let quad = self.quadrature[k];
        (co * co + quad * quad) / (self.power_a[k] * self.power_b[k])
    }

    /// `(value, one-sigma error)` of every bin.
    pub fn estimate(&self, quantity: SpectralQuantity) -> Vec<(f64, f64)> {
        (0..self.bins.count)
            .map(|k| {
                let n = self.counts[k];
                if n == 0 {
                    return (f64::NAN, f64::NAN);
                }
                let coh = self.coherence(k);
                let n = n as f64;
                let misfit = (1.0 - coh).max(0.0);
                match quantity {
                    SpectralQuantity::Admittance => {
                        let value = self.co_spectrum[k] / self.power_a[k];
                        (value, value * (misfit / (2.0 * coh * n)).sqrt())
                    }
                    SpectralQuantity::Coherence => {
                        (coh, coh * misfit * (2.0 / coh).sqrt() / n.sqrt())
                    }
                }
            })
            .collect()
    }
}
