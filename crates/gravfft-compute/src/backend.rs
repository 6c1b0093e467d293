//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution strategies so that
//! the spectral kernels in `gravfft-core` stay independent of how the
//! per-bin work is scheduled. Every wavenumber bin is evaluated on its own,
//! so any backend must produce bit-identical results to the serial one.

use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Serial,
    Cpu,
}

/// Abstraction over compute backends.
///
/// Spectral code operates against this trait. The hot path is filling a
/// lattice of transfer-function values, one per frequency-domain bin.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Evaluate `fill_fn(row, col)` for every bin of a `rows × cols` lattice.
    ///
    /// The returned array is laid out row-major with shape `(rows, cols)`.
    fn parallel_grid_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError>;
}

/// Reserve a zero-filled buffer of `len` values, reporting allocation
/// failure instead of aborting.
pub fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, ComputeError> {
    let mut data: Vec<T> = Vec::new();
    data.try_reserve_exact(len).map_err(|_| ComputeError::OutOfMemory {
        requested: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    data.resize(len, T::default());
    Ok(data)
}

/// Single-threaded backend. Used for reproducibility checks and when the
/// `cpu` feature is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_grid_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError> {
        let mut data = try_zeroed::<Complex64>(rows * cols)?;
        for (idx, value) in data.iter_mut().enumerate() {
            *value = fill_fn(idx / cols, idx % cols);
        }
        Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| ComputeError::DeviceError(e.to_string()))
    }
}
