//! # gravfft Compute
//!
//! Compute backend abstraction for the gravfft workspace. This crate
//! provides a [`ComputeBackend`](backend::ComputeBackend) trait that isolates
//! the spectral kernels from how per-bin work is scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | Serial | always | Implemented |
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, SerialBackend};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
