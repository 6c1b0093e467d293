//! Wavenumber lattice of a padded grid and its radial binning.
//!
//! Bins of the 2-D transform follow the usual FFT ordering: index `i` maps
//! to `i` for `i <= n/2` and to `i - n` above, times the increment
//! `Δk = 2π / (n·d)`. Rows are stored north to south, so the row index is
//! negated to give a north-positive `ky`.

use std::f64::consts::PI;

/// Wavenumber components of one bin (rad/m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinGeometry {
    pub kx: f64,
    pub ky: f64,
    /// Radial wavenumber `|k|`.
    pub mk: f64,
}

/// Wavenumber lattice of an `ny2 × nx2` transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavenumberGrid {
    nx2: usize,
    ny2: usize,
    delta_kx: f64,
    delta_ky: f64,
}

impl WavenumberGrid {
    /// Lattice for a padded grid of `nx2 × ny2` samples spaced `dx × dy` metres.
    pub fn new(nx2: usize, ny2: usize, dx: f64, dy: f64) -> Self {
        Self {
            nx2,
            ny2,
            delta_kx: 2.0 * PI / (nx2 as f64 * dx),
            delta_ky: 2.0 * PI / (ny2 as f64 * dy),
        }
    }

    /// Lattice with explicit increments.
    pub fn from_increments(nx2: usize, ny2: usize, delta_kx: f64, delta_ky: f64) -> Self {
        Self {
            nx2,
            ny2,
            delta_kx,
            delta_ky,
        }
    }

    pub fn nx2(&self) -> usize {
        self.nx2
    }

    pub fn ny2(&self) -> usize {
        self.ny2
    }

    pub fn delta_kx(&self) -> f64 {
        self.delta_kx
    }

    pub fn delta_ky(&self) -> f64 {
        self.delta_ky
    }

    fn signed(index: usize, n: usize) -> f64 {
        if index > n / 2 {
            index as f64 - n as f64
        } else {
            index as f64
        }
    }

    pub fn kx(&self, col: usize) -> f64 {
        Self::signed(col, self.nx2) * self.delta_kx
    }

    pub fn ky(&self, row: usize) -> f64 {
        -Self::signed(row, self.ny2) * self.delta_ky
    }

    pub fn bin(&self, row: usize, col: usize) -> BinGeometry {
        let kx = self.kx(col);
        let ky = self.ky(row);
        BinGeometry {
            kx,
            ky,
            mk: kx.hypot(ky),
        }
    }

    pub fn modk(&self, row: usize, col: usize) -> f64 {
        self.kx(col).hypot(self.ky(row))
    }

    /// Radial bins of width `min(Δkx, Δky)`, `min(nx2, ny2) / 2` of them.
    pub fn radial_bins(&self) -> RadialBins {
        RadialBins {
            delta_k: self.delta_kx.min(self.delta_ky),
            count: self.nx2.min(self.ny2) / 2,
        }
    }
}

/// Annuli of constant radial wavenumber used by the cross-spectral estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialBins {
    pub delta_k: f64,
    pub count: usize,
}

impl RadialBins {
    /// Bin holding wavenumber `mk`, or `None` when it falls past the last bin.
    ///
    /// `mk` is rounded to the nearest multiple of `Δk` and shifted down by
    /// one, so the first bin collects `|k| ≈ Δk`. Values rounding to zero
    /// share bin 0.
    pub fn index_of(&self, mk: f64) -> Option<usize> {
        let ifreq = (mk.abs() / self.delta_k).round() as usize;
        let ifreq = ifreq.saturating_sub(1);
        (ifreq < self.count).then_some(ifreq)
    }

    /// Centre frequency of bin `k` in cycles per metre.
    pub fn frequency(&self, k: usize) -> f64 {
        (k + 1) as f64 * self.delta_k / (2.0 * PI)
    }
}
