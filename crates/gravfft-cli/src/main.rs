//! gravfft command-line interface.
//!
//! Run spectral gravity jobs from TOML configuration files:
//! ```sh
//! gravfft forward job.toml
//! gravfft admittance job.toml -o results/
//! gravfft theory job.toml
//! gravfft validate job.toml
//! gravfft fft-size 1201 901
//! ```

mod config;
mod grid_io;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gravfft_core::spectrum::{Dimensions, FftSettings};

#[derive(Parser)]
#[command(name = "gravfft")]
#[command(about = "Spectral gravity, geoid and admittance modelling of topography")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward-model a gravity, geoid, VGG or deflection grid.
    Forward {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Admittance or coherence between topography and an observed field.
    Admittance {
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Theoretical admittance curve without data.
    Theory {
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a configuration file without running it.
    Validate {
        config: PathBuf,
    },
    /// Show the padded transform size for a grid of `nx × ny` nodes.
    FftSize {
        nx: usize,
        ny: usize,
    },
}

fn output_dir(output: Option<PathBuf>, job: &config::JobConfig) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(&job.output.directory))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Forward { config, output } => {
            println!("gravfft forward model");
            println!("=====================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_forward(&job)?;
            let out_dir = output_dir(output, &job);
            runner::write_grid_output(&result, &out_dir.join(format!("{}.asc", job.output.name)))?;

            println!("Forward model complete.");
            Ok(())
        }
        Commands::Admittance { config, output } => {
            println!("gravfft admittance");
            println!("==================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_admittance(&job)?;
            let out_dir = output_dir(output, &job);
            runner::write_admittance_csv(
                &result.result,
                &out_dir.join(format!("{}.csv", job.output.name)),
                &job,
            )?;
            if job.output.save_json {
                runner::write_json(&result.result, &out_dir.join(format!("{}.json", job.output.name)))?;
            }

            println!("Admittance complete.");
            Ok(())
        }
        Commands::Theory { config, output } => {
            let job = config::load_config(&config)?;
            let curve = runner::run_theory(&job)?;
            let out_dir = output_dir(output, &job);
            runner::write_curve_csv(&curve, &out_dir.join(format!("{}_theory.csv", job.output.name)))?;
            if job.output.save_json {
                runner::write_json(&curve, &out_dir.join(format!("{}_theory.json", job.output.name)))?;
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let params = job.model_parameters();
            job.fft_settings()?;
            if job.input.topography.is_some() {
                params.validate_forward(job.model.product, job.input.density.is_some())?;
            }
            if job.input.field.is_some() {
                params.validate_spectral(&job.spectral_request()?)?;
            }
            if job.theory.is_some() {
                params.validate_theory(&job.theory_request()?)?;
            }
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::FftSize { nx, ny } => {
            println!("Grid: {nx} x {ny}");
            for (name, dimensions) in [
                ("exact", Dimensions::Exact),
                ("fast", Dimensions::Fast),
                ("power_of_two", Dimensions::PowerOfTwo),
            ] {
                let settings = FftSettings {
                    dimensions,
                    ..Default::default()
                };
                let (nx2, ny2) = settings.padded_size(nx, ny)?;
                println!("  {name:<13} {nx2} x {ny2}");
            }
            Ok(())
        }
    }
}
