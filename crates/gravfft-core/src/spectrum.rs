//! Grid preparation and 2-D transforms.
//!
//! Before a grid is transformed it is detrended, embedded in a larger
//! lattice whose size suits the FFT, its margin filled by extrapolation and
//! tapered to zero at the outer edge. [`PreparedGrid`] keeps enough of that
//! bookkeeping to pull the original interior back out after the inverse
//! transform.
//!
//! The transforms follow numpy's convention: the forward transform is
//! unnormalised and the inverse divides by the number of samples.

use std::f64::consts::PI;

use gravfft_compute::backend::try_zeroed;
use gravfft_compute::ComputeError;
use ndarray::{s, Array2};
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::grid::Grid;
use crate::params::ValidationError;
use crate::wavenumber::WavenumberGrid;

/// How the padded transform size is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimensions {
    /// Use the grid dimensions as they are.
    Exact,
    /// Smallest size at least as large as the grid with no prime factor above 5.
    #[default]
    Fast,
    /// Next power of two.
    PowerOfTwo,
    /// Explicit size, which must not be smaller than the grid.
    Fixed { nx: usize, ny: usize },
}

/// How the margin between the grid and the padded edge is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// Point symmetry about the edge sample: `2·f(edge) − f(mirrored)`.
    #[default]
    Edge,
    /// Even reflection about the edge sample.
    Mirror,
    /// Leave the margin at zero.
    None,
}

/// Trend removed before transforming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMode {
    None,
    Mean,
    /// Mid-value `(min + max) / 2`.
    #[default]
    Mid,
    /// Least-squares plane.
    Plane,
}

fn default_taper() -> f64 {
    100.0
}

/// FFT preparation choices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FftSettings {
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub extension: Extension,
    /// Width of the cosine taper as a percentage of each margin.
    #[serde(default = "default_taper")]
    pub taper_percent: f64,
    #[serde(default)]
    pub trend: TrendMode,
}

impl Default for FftSettings {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            extension: Extension::default(),
            taper_percent: default_taper(),
            trend: TrendMode::default(),
        }
    }
}

/// A padded, detrended grid ready for transforming.
#[derive(Debug, Clone)]
pub struct PreparedGrid {
    /// Padded samples, shape `(ny2, nx2)`.
    pub data: Array2<f64>,
    pub wavenumbers: WavenumberGrid,
    /// Constant part of the removed trend.
    pub level: f64,
    /// `(row, col)` of the first interior sample.
    pub origin: (usize, usize),
    /// `(rows, cols)` of the interior.
    pub shape: (usize, usize),
}

impl PreparedGrid {
    /// Copy the original grid's footprint out of a padded array.
    pub fn interior(&self, padded: &Array2<f64>) -> Array2<f64> {
        let (r0, c0) = self.origin;
        let (nr, nc) = self.shape;
        padded.slice(s![r0..r0 + nr, c0..c0 + nc]).to_owned()
    }
}

/// Smallest `m >= n` whose prime factors are all 2, 3 or 5.
pub fn next_fast_len(n: usize) -> usize {
    let mut m = n.max(1);
    loop {
        let mut r = m;
        for p in [2, 3, 5] {
            while r % p == 0 {
                r /= p;
            }
        }
        if r == 1 {
            return m;
        }
        m += 1;
    }
}

impl TrendMode {
    /// Remove the trend, returning the residual and its constant term.
    pub fn remove(self, data: &Array2<f64>) -> (Array2<f64>, f64) {
        let n = data.len().max(1) as f64;
        match self {
            Self::None => (data.clone(), 0.0),
            Self::Mean => {
                let level = data.sum() / n;
                (data.mapv(|v| v - level), level)
            }
            Self::Mid => {
                let (lo, hi) = data
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                let level = if lo.is_finite() { 0.5 * (lo + hi) } else { 0.0 };
                (data.mapv(|v| v - level), level)
            }
            Self::Plane => {
                // Centred index coordinates make the normal equations diagonal.
                let (rows, cols) = data.dim();
                let xc = (cols as f64 - 1.0) / 2.0;
                let yc = (rows as f64 - 1.0) / 2.0;
                let level = data.sum() / n;
                let (mut sxz, mut sxx, mut syz, mut syy) = (0.0, 0.0, 0.0, 0.0);
                for ((r, c), &z) in data.indexed_iter() {
                    let x = c as f64 - xc;
                    let y = r as f64 - yc;
                    sxz += x * z;
                    sxx += x * x;
                    syz += y * z;
                    syy += y * y;
                }
                let bx = if sxx > 0.0 { sxz / sxx } else { 0.0 };
                let by = if syy > 0.0 { syz / syy } else { 0.0 };
                let residual = Array2::from_shape_fn((rows, cols), |(r, c)| {
                    data[[r, c]] - level - bx * (c as f64 - xc) - by * (r as f64 - yc)
                });
                (residual, level)
            }
        }
    }
}

/// Index of the sample mirrored about the nearest edge, clamped into `0..n`.
fn reflect(i: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let j = if i < 0 {
        -i
    } else if i > last {
        2 * last - i
    } else {
        i
    };
    j.clamp(0, last) as usize
}

impl Extension {
    /// Value at signed offset `i` of a line of `n` samples read through `line`.
    fn value(self, line: impl Fn(usize) -> f64, n: usize, i: isize) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Mirror => line(reflect(i, n)),
            Self::Edge => {
                let edge = if i < 0 { line(0) } else { line(n - 1) };
                2.0 * edge - line(reflect(i, n))
            }
        }
    }
}

/// Cosine taper weight at signed offset `i` of a line of `n` samples with
/// `left` and `right` margin samples.
fn taper_weight(i: isize, n: usize, left: usize, right: usize, percent: f64) -> f64 {
    if percent <= 0.0 {
        return 1.0;
    }
    let (d, margin) = if i < 0 {
        ((-i) as f64, left)
    } else if i >= n as isize {
        ((i - n as isize + 1) as f64, right)
    } else {
        return 1.0;
    };
    let width = margin as f64 * percent.min(100.0) / 100.0;
    if width <= 0.0 || d >= width {
        0.0
    } else {
        0.5 * (1.0 + (PI * d / width).cos())
    }
}

/// Zero-filled `rows × cols` array, reporting allocation failure instead
/// of aborting.
pub fn try_zeros(rows: usize, cols: usize) -> Result<Array2<f64>, ComputeError> {
    Array2::from_shape_vec((rows, cols), try_zeroed::<f64>(rows * cols)?)
        .map_err(|e| ComputeError::DeviceError(e.to_string()))
}

/// `f` applied to every sample of `input`, written to a fallibly
/// allocated array.
pub fn try_mapv(input: &Array2<f64>, f: impl Fn(f64) -> f64) -> Result<Array2<f64>, ComputeError> {
    let (rows, cols) = input.dim();
    let mut out = try_zeros(rows, cols)?;
    out.zip_mut_with(input, |o, &v| *o = f(v));
    Ok(out)
}

impl FftSettings {
    /// Settings identical to these but with a different trend mode.
    pub fn with_trend(self, trend: TrendMode) -> Self {
        Self { trend, ..self }
    }

    /// Padded `(nx2, ny2)` for a grid of `nx × ny` samples.
    pub fn padded_size(&self, nx: usize, ny: usize) -> Result<(usize, usize), ValidationError> {
        match self.dimensions {
            Dimensions::Exact => Ok((nx, ny)),
            Dimensions::Fast => Ok((next_fast_len(nx), next_fast_len(ny))),
            Dimensions::PowerOfTwo => Ok((nx.next_power_of_two(), ny.next_power_of_two())),
            Dimensions::Fixed { nx: fx, ny: fy } => {
                if fx < nx || fy < ny {
                    Err(ValidationError::InvalidParameter {
                        name: "dimensions",
                        value: fx.min(fy) as f64,
                        reason: "transform size is smaller than the grid",
                    })
                } else {
                    Ok((fx, fy))
                }
            }
        }
    }

    /// Detrend, pad, extend and taper `grid`.
    pub fn prepare(&self, grid: &Grid) -> Result<PreparedGrid, EngineError> {
        let (ny, nx) = grid.data.dim();
        if nx == 0 || ny == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "grid",
                value: 0.0,
                reason: "grid has no samples",
            }
            .into());
        }
        let [dx, dy] = grid.spacing_metres();
        for (name, d) in [("dx", dx), ("dy", dy)] {
            if !(d > 0.0) {
                return Err(ValidationError::InvalidParameter {
                    name,
                    value: d,
                    reason: "grid spacing must be positive",
                }
                .into());
            }
        }

        let (nx2, ny2) = self.padded_size(nx, ny)?;
        let (residual, level) = self.trend.remove(&grid.data);
        let (r0, c0) = ((ny2 - ny) / 2, (nx2 - nx) / 2);
        let (left, right) = (c0, nx2 - nx - c0);
        let (top, bottom) = (r0, ny2 - ny - r0);

        let mut padded = try_zeros(ny2, nx2)?;
        padded
            .slice_mut(s![r0..r0 + ny, c0..c0 + nx])
            .assign(&residual);

        if nx2 > nx || ny2 > ny {
            // Fill the margin of the interior rows, then every column above and below.
            for r in 0..ny {
                for c in (0..left).chain(c0 + nx..nx2) {
                    let i = c as isize - c0 as isize;
                    padded[[r0 + r, c]] =
                        self.extension.value(|k| residual[[r, k]], nx, i);
                }
            }
            for c in 0..nx2 {
                for r in (0..top).chain(r0 + ny..ny2) {
                    let i = r as isize - r0 as isize;
                    let v = self.extension.value(|k| padded[[r0 + k, c]], ny, i);
                    padded[[r, c]] = v;
                }
            }
            let wx: Vec<f64> = (0..nx2)
                .map(|c| taper_weight(c as isize - c0 as isize, nx, left, right, self.taper_percent))
                .collect();
            let wy: Vec<f64> = (0..ny2)
                .map(|r| taper_weight(r as isize - r0 as isize, ny, top, bottom, self.taper_percent))
                .collect();
            for ((r, c), v) in padded.indexed_iter_mut() {
                *v *= wx[c] * wy[r];
            }
        }

        Ok(PreparedGrid {
            data: padded,
            wavenumbers: WavenumberGrid::new(nx2, ny2, dx, dy),
            level,
            origin: (r0, c0),
            shape: (ny, nx),
        })
    }
}

fn transpose(src: &[Complex64], dst: &mut [Complex64], rows: usize, cols: usize) {
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
}

/// In-place 2-D transform of a row-major `rows × cols` buffer.
fn transform_2d(
    data: &mut [Complex64],
    rows: usize,
    cols: usize,
    direction: FftDirection,
) -> Result<(), ComputeError> {
    if data.is_empty() {
        return Ok(());
    }
    let mut planner = FftPlanner::new();
    // rustfft processes consecutive chunks of the plan length.
    planner.plan_fft(cols, direction).process(data);
    let mut transposed = try_zeroed::<Complex64>(rows * cols)?;
    transpose(data, &mut transposed, rows, cols);
    planner.plan_fft(rows, direction).process(&mut transposed);
    transpose(&transposed, data, cols, rows);
    Ok(())
}

/// Unnormalised forward transform of a real array.
pub fn forward_fft(input: &Array2<f64>) -> Result<Array2<Complex64>, ComputeError> {
    let (rows, cols) = input.dim();
    let mut data = try_zeroed::<Complex64>(rows * cols)?;
    for (dst, &v) in data.iter_mut().zip(input.iter()) {
        *dst = Complex64::new(v, 0.0);
    }
    transform_2d(&mut data, rows, cols, FftDirection::Forward)?;
    Array2::from_shape_vec((rows, cols), data).map_err(|e| ComputeError::DeviceError(e.to_string()))
}

/// Normalised inverse transform, keeping the real part.
pub fn inverse_fft(input: &Array2<Complex64>) -> Result<Array2<f64>, ComputeError> {
    let (rows, cols) = input.dim();
    let mut data = try_zeroed::<Complex64>(rows * cols)?;
    for (dst, &v) in data.iter_mut().zip(input.iter()) {
        *dst = v;
    }
    transform_2d(&mut data, rows, cols, FftDirection::Inverse)?;
    let norm = 1.0 / (rows * cols).max(1) as f64;
    let mut real = try_zeros(rows, cols)?;
    for (dst, c) in real.iter_mut().zip(data.iter()) {
        *dst = c.re * norm;
    }
    Ok(real)
}
