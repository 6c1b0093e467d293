//! Regular 2-D grids of real samples.
//!
//! A [`Grid`] stores its samples in an `Array2<f64>` of shape
//! `(n_rows, n_columns)`. Row 0 is the northernmost row and column 0 the
//! westernmost column, so the sample at `[[row, col]]` sits at
//! `x = x_min + col·dx`, `y = y_max − row·dy` (gridline registration).
//!
//! Grids are treated as values: every preparation step returns a new grid
//! rather than mutating one that may still be referenced elsewhere.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS;
use crate::params::ValidationError;

/// Node placement of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    /// Samples sit on the lines of the lattice (bounds are sample positions).
    #[default]
    Gridline,
    /// Samples sit at cell centres (bounds are cell edges).
    Pixel,
}

/// Units of the grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Projected coordinates in metres.
    #[default]
    Cartesian,
    /// Longitude/latitude in degrees; converted with a flat-Earth
    /// approximation before any spectral work.
    Geographic,
}

/// Grid metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    /// Bounds `[x_min, x_max, y_min, y_max]`.
    pub wesn: [f64; 4],
    /// Increments `[dx, dy]`.
    pub inc: [f64; 2],
    pub registration: Registration,
    #[serde(default)]
    pub coordinates: CoordinateSystem,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub z_units: String,
    #[serde(default)]
    pub remark: String,
}

/// A rectangular lattice of real samples with its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub header: GridHeader,
    pub data: Array2<f64>,
}

impl Grid {
    /// Build a grid from its samples, lower-left origin and increments.
    pub fn from_array(
        data: Array2<f64>,
        x_min: f64,
        y_min: f64,
        inc: [f64; 2],
        registration: Registration,
    ) -> Self {
        let (rows, cols) = data.dim();
        let span = |n: usize| match registration {
            Registration::Gridline => n.saturating_sub(1) as f64,
            Registration::Pixel => n as f64,
        };
        let header = GridHeader {
            wesn: [x_min, x_min + span(cols) * inc[0], y_min, y_min + span(rows) * inc[1]],
            inc,
            registration,
            coordinates: CoordinateSystem::Cartesian,
            title: String::new(),
            z_units: String::new(),
            remark: String::new(),
        };
        Self { header, data }
    }

    /// A gridline-registered grid with its origin at (0, 0) and spacing `dx × dy`.
    pub fn with_spacing(data: Array2<f64>, dx: f64, dy: f64) -> Self {
        Self::from_array(data, 0.0, 0.0, [dx, dy], Registration::Gridline)
    }

    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// A grid with the same header and new samples of the same shape.
    pub fn with_data(&self, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        Self { header: self.header.clone(), data }
    }

    /// Whether any sample is NaN.
    pub fn has_nans(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    /// Minimum and maximum of the valid samples, or `None` when every sample is NaN.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Replace every NaN with `fallback`, returning the new grid and the
    /// number of substituted samples.
    pub fn with_nans_replaced(&self, fallback: f64) -> (Self, usize) {
        let mut count = 0;
        let data = self.data.mapv(|v| {
            if v.is_nan() {
                count += 1;
                fallback
            } else {
                v
            }
        });
        (self.with_data(data), count)
    }

    /// Add `delta` to every sample.
    pub fn offset(&self, delta: f64) -> Self {
        self.with_data(self.data.mapv(|v| v + delta))
    }

    /// Mean of the four corner samples.
    pub fn corner_mean(&self) -> f64 {
        let (r, c) = (self.n_rows() - 1, self.n_columns() - 1);
        0.25 * (self.data[[0, 0]] + self.data[[r, 0]] + self.data[[0, c]] + self.data[[r, c]])
    }

    /// Whether two grids share dimensions, increments, bounds and registration.
    pub fn is_co_registered(&self, other: &Grid) -> bool {
        let a = &self.header;
        let b = &other.header;
        let tol_x = 1e-6 * a.inc[0].abs();
        let tol_y = 1e-6 * a.inc[1].abs();
        self.data.dim() == other.data.dim()
            && a.registration == b.registration
            && a.coordinates == b.coordinates
            && (a.inc[0] - b.inc[0]).abs() <= tol_x
            && (a.inc[1] - b.inc[1]).abs() <= tol_y
            && (a.wesn[0] - b.wesn[0]).abs() <= tol_x
            && (a.wesn[1] - b.wesn[1]).abs() <= tol_x
            && (a.wesn[2] - b.wesn[2]).abs() <= tol_y
            && (a.wesn[3] - b.wesn[3]).abs() <= tol_y
    }

    /// Fail with [`ValidationError::GridMismatch`] unless `other` is co-registered.
    pub fn ensure_co_registered(&self, other: &Grid, what: &str) -> Result<(), ValidationError> {
        if self.is_co_registered(other) {
            Ok(())
        } else {
            Err(ValidationError::GridMismatch {
                what: what.to_string(),
                left: format!("{}x{} @ {:?}", self.n_columns(), self.n_rows(), self.header.inc),
                right: format!("{}x{} @ {:?}", other.n_columns(), other.n_rows(), other.header.inc),
            })
        }
    }

    /// Sample spacing `[dx, dy]` in metres.
    ///
    /// Geographic increments are scaled by the length of a degree on the
    /// mean-radius sphere, with the x increment shortened by the cosine of
    /// the mid-latitude.
    pub fn spacing_metres(&self) -> [f64; 2] {
        match self.header.coordinates {
            CoordinateSystem::Cartesian => self.header.inc,
            CoordinateSystem::Geographic => {
                let metres_per_degree = EARTH_RADIUS * std::f64::consts::PI / 180.0;
                let mid_lat = 0.5 * (self.header.wesn[2] + self.header.wesn[3]);
                [
                    self.header.inc[0] * metres_per_degree * mid_lat.to_radians().cos(),
                    self.header.inc[1] * metres_per_degree,
                ]
            }
        }
    }
}
