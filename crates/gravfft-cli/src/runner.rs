//! Job execution: read grids, run the engine, write results.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use gravfft_compute::ComputeBackend;
use gravfft_core::admittance::{AdmittanceResult, SpectralQuantity, TheoreticalCurve};
use gravfft_core::engine::{Diagnostic, ForwardOutput, SpectralOutput};
use gravfft_core::{GravityEngine, Grid};

use crate::config::JobConfig;
use crate::grid_io;

/// Build the compute backend for the configured thread count.
pub fn create_backend(threads: Option<usize>) -> Result<Arc<dyn ComputeBackend>> {
    #[cfg(feature = "cpu")]
    {
        let backend = match threads {
            Some(n) => gravfft_compute::CpuBackend::with_threads(n)
                .context("Failed to build the worker thread pool")?,
            None => gravfft_compute::CpuBackend::new(),
        };
        println!("Backend: {}", backend.device_info().name);
        Ok(Arc::new(backend))
    }
    #[cfg(not(feature = "cpu"))]
    {
        if threads.is_some_and(|n| n > 1) {
            log::warn!("Built without the 'cpu' feature; running single-threaded");
        }
        println!("Backend: Serial");
        Ok(Arc::new(gravfft_compute::SerialBackend))
    }
}

fn build_engine(job: &JobConfig) -> Result<GravityEngine> {
    let backend = create_backend(job.compute.threads)?;
    Ok(GravityEngine::new(backend).with_fft(job.fft_settings()?))
}

fn read_input(path: Option<&Path>, what: &str, job: &JobConfig) -> Result<Grid> {
    let path = path.with_context(|| format!("No {what} grid given in [input]"))?;
    let grid = grid_io::read_grid(path, job.input.coordinates)
        .with_context(|| format!("Cannot load {what} grid {}", path.display()))?;
    println!(
        "Loaded {what} grid: {} x {} from {}",
        grid.n_columns(),
        grid.n_rows(),
        path.display()
    );
    Ok(grid)
}

fn report(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        println!("Note: {d}");
    }
}

/// Forward-model the configured product.
pub fn run_forward(job: &JobConfig) -> Result<ForwardOutput> {
    let topography = read_input(job.input.topography.as_deref(), "topography", job)?;
    let density = match job.input.density.as_deref() {
        Some(path) => Some(read_input(Some(path), "density", job)?),
        None => None,
    };
    let engine = build_engine(job)?;
    let params = job.model_parameters();
    println!("Forward model: {:?} of {}", job.model.product, params.field.title());

    let output = engine.forward(&params, job.model.product, &topography, density.as_ref())?;
    report(&output.diagnostics);
    if let Some((lo, hi)) = output.grid.z_range() {
        println!("Result range: {lo:.6e} to {hi:.6e} {}", output.grid.header.z_units);
    }
    Ok(output)
}

/// Radially averaged admittance or coherence between topography and field.
pub fn run_admittance(job: &JobConfig) -> Result<SpectralOutput> {
    let topography = read_input(job.input.topography.as_deref(), "topography", job)?;
    let field = read_input(job.input.field.as_deref(), "field", job)?;
    let engine = build_engine(job)?;
    let request = job.spectral_request()?;

    let output = engine.cross_spectrum(&job.model_parameters(), &request, &topography, &field)?;
    report(&output.diagnostics);
    println!(
        "Computed {:?} in {} radial bins (mean depth {:.1} m)",
        request.quantity,
        output.result.rows.len(),
        output.z_level
    );
    Ok(output)
}

/// Theoretical admittance curve without data.
pub fn run_theory(job: &JobConfig) -> Result<TheoreticalCurve> {
    let request = job.theory_request()?;
    let engine = GravityEngine::serial();
    let curve = engine.theoretical_curve(&job.model_parameters(), &request)?;
    println!(
        "Theoretical admittance ({:?}): {} points",
        request.direction,
        curve.points.len()
    );
    Ok(curve)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else {
        format!("{v:.6e}")
    }
}

/// Write a grid as ESRI ASCII plus a JSON sidecar holding its header.
pub fn write_grid_output(output: &ForwardOutput, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    grid_io::write_grid(&output.grid, path)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    let sidecar = path.with_extension("json");
    let meta = serde_json::json!({
        "header": output.grid.header,
        "terms": output.terms,
        "z_level": output.z_level,
        "diagnostics": output.diagnostics,
    });
    std::fs::write(&sidecar, serde_json::to_string_pretty(&meta)?)?;

    println!("Grid written to: {}", path.display());
    Ok(())
}

/// Write an admittance/coherence table as CSV with a commented header.
pub fn write_admittance_csv(result: &AdmittanceResult, path: &Path, job: &JobConfig) -> Result<()> {
    ensure_parent(path)?;
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "# gravfft {} table", quantity_name(result))?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# field: {}", job.model.field)?;
    if let Some(direction) = result.direction {
        writeln!(file, "# theory: {direction:?}")?;
    }
    writeln!(file, "#")?;

    let mut columns = vec![result.axis.label(), "value", "error"];
    if result.direction.is_some() {
        columns.push("theoretical");
    }
    writeln!(file, "{}", columns.join(","))?;

    for row in &result.rows {
        write!(
            file,
            "{},{},{}",
            fmt_value(row.frequency),
            fmt_value(row.value),
            fmt_value(row.error)
        )?;
        if let Some(t) = row.theoretical {
            write!(file, ",{}", fmt_value(t))?;
        }
        writeln!(file)?;
    }

    println!("Table written to: {}", path.display());
    Ok(())
}

fn quantity_name(result: &AdmittanceResult) -> &'static str {
    match result.quantity {
        SpectralQuantity::Admittance => "admittance",
        SpectralQuantity::Coherence => "coherence",
    }
}

/// Write a theoretical curve as two-column CSV.
pub fn write_curve_csv(curve: &TheoreticalCurve, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "# gravfft theoretical admittance ({:?})", curve.direction)?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "#")?;
    writeln!(file, "{},admittance", curve.axis.label())?;
    for p in &curve.points {
        writeln!(file, "{},{}", fmt_value(p.frequency), fmt_value(p.value))?;
    }

    println!("Curve written to: {}", path.display());
    Ok(())
}

/// Write any serialisable result as pretty JSON.
pub fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    println!("JSON written to: {}", path.display());
    Ok(())
}
