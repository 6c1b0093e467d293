//! TOML configuration deserialisation for modelling jobs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

use gravfft_core::admittance::{
    FrequencyAxis, LoadDirection, SpectralQuantity, SpectralRequest, TheoryRequest,
};
use gravfft_core::constants::{DEFAULT_TERMS, MGAL_AT_45};
use gravfft_core::grid::CoordinateSystem;
use gravfft_core::params::{
    Adjustment, CompensationDepths, EarthGeometry, FieldType, FlexureParams, ForwardProduct,
    ModelParameters, NormalGravity,
};
use gravfft_core::spectrum::{Dimensions, Extension, FftSettings, TrendMode};

/// A length in metres. TOML may give a number of metres or a string with
/// a `k` suffix for kilometres (`"4.5k"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

/// Parse `"2500"`, `"2500m"` or `"2.5k"` into metres.
pub fn parse_length(text: &str) -> Result<f64, String> {
    let t = text.trim();
    let (number, scale) = if let Some(km) = t.strip_suffix(&['k', 'K'][..]) {
        (km, 1000.0)
    } else if let Some(m) = t.strip_suffix(&['m', 'M'][..]) {
        (m, 1.0)
    } else {
        (t, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .map(|v| v * scale)
        .map_err(|_| format!("invalid length '{text}' (expected metres or a 'k' suffix for km)"))
}

impl<'de> Deserialize<'de> for Length {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Length(v)),
            Raw::Text(s) => parse_length(&s).map(Length).map_err(serde::de::Error::custom),
        }
    }
}

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fft: FftConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    pub theory: Option<TheoryConfig>,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input grids (ESRI ASCII). Relative paths resolve against the job file.
#[derive(Debug, Default, Deserialize)]
pub struct InputConfig {
    pub topography: Option<PathBuf>,
    /// Grid of density contrasts for forward models.
    pub density: Option<PathBuf>,
    /// Observed field for admittance/coherence.
    pub field: Option<PathBuf>,
    #[serde(default)]
    pub coordinates: CoordinateSystem,
}

/// Physical model.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub field: FieldType,
    #[serde(default)]
    pub product: ForwardProduct,
    #[serde(default)]
    pub adjustment: Adjustment,
    #[serde(default = "default_terms")]
    pub terms: u32,
    pub density: Option<f64>,
    pub water_depth: Option<Length>,
    #[serde(default = "default_mgal_at_45")]
    pub mgal_at_45: f64,
    #[serde(default)]
    pub geometry: EarthGeometry,
    pub flexure: Option<FlexureConfig>,
    #[serde(default)]
    pub compensation: CompensationConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            field: FieldType::default(),
            product: ForwardProduct::default(),
            adjustment: Adjustment::default(),
            terms: DEFAULT_TERMS,
            density: None,
            water_depth: None,
            mgal_at_45: MGAL_AT_45,
            geometry: EarthGeometry::default(),
            flexure: None,
            compensation: CompensationConfig::default(),
        }
    }
}

fn default_terms() -> u32 {
    DEFAULT_TERMS
}

fn default_mgal_at_45() -> f64 {
    MGAL_AT_45
}

/// Elastic plate and densities.
#[derive(Debug, Deserialize)]
pub struct FlexureConfig {
    /// Elastic thickness, or a rigidity (N·m) when above 1e10.
    pub te: Length,
    pub rho_load: f64,
    pub rho_mantle: f64,
    #[serde(default)]
    pub rho_water: f64,
    pub rho_infill: Option<f64>,
}

/// Mean depths of the compensating interfaces.
#[derive(Debug, Default, Deserialize)]
pub struct CompensationConfig {
    pub moho: Option<Length>,
    pub swell: Option<Length>,
}

/// Transform size: a keyword or an explicit `{ nx, ny }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DimensionsSpec {
    Keyword(String),
    Size { nx: usize, ny: usize },
}

impl Default for DimensionsSpec {
    fn default() -> Self {
        Self::Keyword("fast".into())
    }
}

impl DimensionsSpec {
    pub fn resolve(&self) -> Result<Dimensions> {
        match self {
            Self::Size { nx, ny } => Ok(Dimensions::Fixed { nx: *nx, ny: *ny }),
            Self::Keyword(k) => match k.as_str() {
                "exact" => Ok(Dimensions::Exact),
                "fast" => Ok(Dimensions::Fast),
                "power_of_two" | "pow2" => Ok(Dimensions::PowerOfTwo),
                other => bail!(
                    "Unknown FFT dimensions '{}'. Valid: exact, fast, power_of_two or {{ nx, ny }}",
                    other
                ),
            },
        }
    }
}

/// FFT preparation.
#[derive(Debug, Deserialize)]
pub struct FftConfig {
    #[serde(default)]
    pub dimensions: DimensionsSpec,
    #[serde(default)]
    pub extension: Extension,
    /// Taper width as a percentage of the margin.
    #[serde(default = "default_taper")]
    pub taper: f64,
    #[serde(default)]
    pub trend: TrendMode,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            dimensions: DimensionsSpec::default(),
            extension: Extension::default(),
            taper: default_taper(),
            trend: TrendMode::default(),
        }
    }
}

fn default_taper() -> f64 {
    100.0
}

/// Admittance/coherence options.
#[derive(Debug, Default, Deserialize)]
pub struct SpectrumConfig {
    #[serde(default)]
    pub quantity: SpectralQuantity,
    /// Add the "loading from below" theoretical column.
    #[serde(default)]
    pub from_below: bool,
    /// Add the "loading from top" theoretical column.
    #[serde(default)]
    pub from_top: bool,
    #[serde(default)]
    pub wavelength: bool,
    #[serde(default)]
    pub km: bool,
}

/// Data-free theoretical curve.
#[derive(Debug, Deserialize)]
pub struct TheoryConfig {
    pub direction: LoadDirection,
    pub points: usize,
    pub spacing: Length,
    #[serde(default = "zero_length")]
    pub mean_depth: Length,
    #[serde(default)]
    pub wavelength: bool,
    #[serde(default)]
    pub km: bool,
}

fn zero_length() -> Length {
    Length(0.0)
}

/// Thread pool settings.
#[derive(Debug, Default, Deserialize)]
pub struct ComputeConfig {
    /// Worker threads (default: all cores).
    pub threads: Option<usize>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Base name of the written files (default: "gravfft").
    #[serde(default = "default_name")]
    pub name: String,
    /// Whether to also save tables as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            name: default_name(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_name() -> String {
    "gravfft".into()
}

impl JobConfig {
    /// The physical parameter bundle.
    pub fn model_parameters(&self) -> ModelParameters {
        let m = &self.model;
        ModelParameters {
            field: m.field,
            adjustment: m.adjustment,
            terms: m.terms,
            density: m.density,
            flexure: m.flexure.as_ref().map(|f| FlexureParams {
                te: f.te.0,
                rho_load: f.rho_load,
                rho_mantle: f.rho_mantle,
                rho_water: f.rho_water,
                rho_infill: f.rho_infill,
            }),
            depths: CompensationDepths {
                moho: m.compensation.moho.map(|l| l.0),
                swell: m.compensation.swell.map(|l| l.0),
            },
            water_depth: m.water_depth.map_or(0.0, |l| l.0),
            gravity: NormalGravity {
                mgal_at_45: m.mgal_at_45,
            },
            geometry: m.geometry,
        }
    }

    pub fn fft_settings(&self) -> Result<FftSettings> {
        Ok(FftSettings {
            dimensions: self.fft.dimensions.resolve()?,
            extension: self.fft.extension,
            taper_percent: self.fft.taper,
            trend: self.fft.trend,
        })
    }

    pub fn spectral_request(&self) -> Result<SpectralRequest> {
        let s = &self.spectrum;
        let axis = FrequencyAxis {
            wavelength: s.wavelength,
            kilometres: s.km,
        };
        Ok(SpectralRequest::from_flags(
            s.quantity == SpectralQuantity::Coherence,
            s.from_below,
            s.from_top,
            axis,
        )?)
    }

    pub fn theory_request(&self) -> Result<TheoryRequest> {
        let t = self
            .theory
            .as_ref()
            .context("Theoretical curve requires a [theory] section")?;
        Ok(TheoryRequest {
            direction: t.direction,
            points: t.points,
            spacing: t.spacing.0,
            mean_depth: t.mean_depth.0,
            axis: FrequencyAxis {
                wavelength: t.wavelength,
                kilometres: t.km,
            },
        })
    }

    /// Make relative input paths relative to `base`.
    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.input.topography,
            &mut self.input.density,
            &mut self.input.field,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration {}", path.display()))?;
    let mut config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid configuration {}", path.display()))?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}
