//! Model parameters and their validation.
//!
//! Every precondition of a run is checked here, before any spectral buffer
//! is allocated. A failed check is a [`ValidationError`]; nothing is
//! computed and no partial output is produced.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admittance::{LoadDirection, SpectralRequest, TheoryRequest};
use crate::constants::{
    elastic_thickness, flexural_rigidity, DEFAULT_TERMS, MAX_TERMS, MGAL_AT_45, MGAL_PER_MS2,
    RIGIDITY_THRESHOLD,
};

/// Precondition failures detected before computation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{what} grids are not co-registered ({left} vs {right})")]
    GridMismatch {
        what: String,
        left: String,
        right: String,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Parker expansion order must be within 1..={max}, got {got}")]
    TermsOutOfRange { got: u32, max: u32 },

    #[error("Choose only one theoretical admittance model (from below or from top)")]
    ConflictingLoadDirections,

    #[error("{context} is only defined for free-air or geoid anomalies, not {field}")]
    UnsupportedField {
        field: FieldType,
        context: &'static str,
    },

    #[error("Invalid value {value} for {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Geopotential quantity produced by a forward run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldType {
    /// Free-air gravity anomaly (mGal).
    #[default]
    #[serde(rename = "faa")]
    FreeAir,
    /// Geoid anomaly (m).
    #[serde(rename = "geoid")]
    Geoid,
    /// Vertical gravity gradient (Eötvös).
    #[serde(rename = "vgg")]
    Vgg,
    /// East component of the vertical deflection (microradians).
    #[serde(rename = "east")]
    EastDeflection,
    /// North component of the vertical deflection (microradians).
    #[serde(rename = "north")]
    NorthDeflection,
}

impl FieldType {
    pub fn title(self) -> &'static str {
        match self {
            Self::FreeAir => "Gravity anomalies",
            Self::Geoid => "Geoid anomalies",
            Self::Vgg => "Vertical Gravity Gradient anomalies",
            Self::EastDeflection => "Deflection of the vertical - East",
            Self::NorthDeflection => "Deflection of the vertical - North",
        }
    }

    pub fn units(self) -> &'static str {
        match self {
            Self::FreeAir => "mGal",
            Self::Geoid => "meter",
            Self::Vgg => "Eotvos",
            Self::EastDeflection | Self::NorthDeflection => "microradian",
        }
    }

    /// Whether closed-form admittance curves exist for this field.
    pub fn has_theoretical_admittance(self) -> bool {
        matches!(self, Self::FreeAir | Self::Geoid)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FreeAir => "free-air anomaly",
            Self::Geoid => "geoid",
            Self::Vgg => "vertical gravity gradient",
            Self::EastDeflection => "east deflection",
            Self::NorthDeflection => "north deflection",
        };
        f.write_str(name)
    }
}

/// Post-processing of a free-air anomaly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    None,
    /// Add the gravity of the slab implied by the removed mean level.
    Slab,
    /// Complete Bouguer anomaly: slab minus the predicted anomaly.
    Bouguer,
    /// Shift so that the mean of the four corners is zero.
    Zero,
}

/// Elastic plate and densities of an isostatic model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlexureParams {
    /// Elastic thickness (m). Values above 1e10 are a flexural rigidity (N·m).
    pub te: f64,
    /// Load density (kg/m³).
    pub rho_load: f64,
    /// Mantle density (kg/m³).
    pub rho_mantle: f64,
    /// Water density (kg/m³); zero for a load in air.
    pub rho_water: f64,
    /// Infill density (kg/m³). When it differs from `rho_load` the
    /// approximate infill solution is used.
    #[serde(default)]
    pub rho_infill: Option<f64>,
}

impl FlexureParams {
    /// Elastic thickness in metres, converting a rigidity if one was given.
    pub fn elastic_thickness(&self) -> f64 {
        if self.te > RIGIDITY_THRESHOLD {
            elastic_thickness(self.te)
        } else {
            self.te
        }
    }

    /// Flexural rigidity of the plate (N·m).
    pub fn rigidity(&self) -> f64 {
        flexural_rigidity(self.elastic_thickness())
    }

    /// Crust-water density contrast.
    pub fn rho_cw(&self) -> f64 {
        self.rho_load - self.rho_water
    }

    /// Mantle-crust density contrast.
    pub fn rho_mc(&self) -> f64 {
        self.rho_mantle - self.rho_load
    }

    /// Mantle-water density contrast.
    pub fn rho_mw(&self) -> f64 {
        self.rho_mantle - self.rho_water
    }

    /// Infill density when it differs from the load density.
    pub fn approximate_infill(&self) -> Option<f64> {
        self.rho_infill.filter(|&ri| ri != self.rho_load)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.te < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "te",
                value: self.te,
                reason: "elastic thickness must not be negative",
            });
        }
        let effective_load = self.approximate_infill().unwrap_or(self.rho_load);
        if self.rho_mantle <= effective_load || self.rho_mantle <= self.rho_load {
            return Err(ValidationError::InvalidParameter {
                name: "rho_mantle",
                value: self.rho_mantle,
                reason: "mantle must be denser than the load and infill",
            });
        }
        Ok(())
    }
}

/// Mean depths of the compensating interfaces (m, positive down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompensationDepths {
    /// Mean Moho depth.
    #[serde(default)]
    pub moho: Option<f64>,
    /// Mean depth of swell compensation.
    #[serde(default)]
    pub swell: Option<f64>,
}

/// Reference gravity at 45° latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalGravity {
    pub mgal_at_45: f64,
}

impl NormalGravity {
    /// In mGal.
    pub fn mgal(&self) -> f64 {
        self.mgal_at_45
    }

    /// In m/s².
    pub fn ms2(&self) -> f64 {
        self.mgal_at_45 / MGAL_PER_MS2
    }
}

impl Default for NormalGravity {
    fn default() -> Self {
        Self { mgal_at_45: MGAL_AT_45 }
    }
}

/// Geometry assumed by the closed-form admittance curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarthGeometry {
    #[default]
    Flat,
    /// Apply the earth-curvature factor `2Rf / (4πRf + 1)`.
    Spherical,
}

/// What a forward run produces from the topography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardProduct {
    /// Field of the topography with a constant or gridded density contrast.
    #[default]
    Anomaly,
    /// The flexed compensation surface itself (m), centred on the mean Moho depth.
    Flexure,
    /// Field of the flexed Moho (density contrast mantle − load).
    Moho,
    /// Field predicted through the "loading from top" admittance.
    TopLoad,
    /// Field predicted through the "loading from below" admittance.
    BottomLoad,
}

/// The Parker order actually evaluated for a product.
///
/// Predictions through a theoretical admittance (`TopLoad`, `BottomLoad`)
/// are first-order models: their transfer function is linear in the
/// topography, so only the n = 1 term is evaluated. Any higher request is
/// clamped and reported rather than silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermPolicy {
    pub requested: u32,
    pub used: u32,
}

impl TermPolicy {
    pub fn for_product(product: ForwardProduct, requested: u32) -> Self {
        let used = match product {
            ForwardProduct::TopLoad | ForwardProduct::BottomLoad => requested.min(1),
            _ => requested,
        };
        Self { requested, used }
    }

    pub fn is_clamped(&self) -> bool {
        self.used != self.requested
    }
}

/// Physical parameter bundle shared by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default)]
    pub field: FieldType,
    #[serde(default)]
    pub adjustment: Adjustment,
    /// Order of the Parker expansion.
    #[serde(default = "default_terms")]
    pub terms: u32,
    /// Constant density contrast across the surface (kg/m³).
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub flexure: Option<FlexureParams>,
    #[serde(default)]
    pub depths: CompensationDepths,
    /// Water depth / observation level removed from the topography (m).
    #[serde(default)]
    pub water_depth: f64,
    #[serde(default)]
    pub gravity: NormalGravity,
    #[serde(default)]
    pub geometry: EarthGeometry,
}

fn default_terms() -> u32 {
    DEFAULT_TERMS
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            field: FieldType::default(),
            adjustment: Adjustment::default(),
            terms: DEFAULT_TERMS,
            density: None,
            flexure: None,
            depths: CompensationDepths::default(),
            water_depth: 0.0,
            gravity: NormalGravity::default(),
            geometry: EarthGeometry::default(),
        }
    }
}

impl ModelParameters {
    /// Flexure parameters, or a [`ValidationError::MissingParameter`] naming `purpose`.
    pub fn require_flexure(&self, purpose: &str) -> Result<&FlexureParams, ValidationError> {
        self.flexure.as_ref().ok_or_else(|| {
            ValidationError::MissingParameter(format!("flexure (te/densities) for {purpose}"))
        })
    }

    pub fn require_moho(&self, purpose: &str) -> Result<f64, ValidationError> {
        self.depths
            .moho
            .ok_or_else(|| ValidationError::MissingParameter(format!("Moho depth for {purpose}")))
    }

    pub fn require_swell(&self, purpose: &str) -> Result<f64, ValidationError> {
        self.depths
            .swell
            .ok_or_else(|| ValidationError::MissingParameter(format!("swell depth for {purpose}")))
    }

    fn validate_common(&self) -> Result<(), ValidationError> {
        if self.terms == 0 || self.terms > MAX_TERMS {
            return Err(ValidationError::TermsOutOfRange {
                got: self.terms,
                max: MAX_TERMS,
            });
        }
        if self.water_depth < 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "water_depth",
                value: self.water_depth,
                reason: "must be positive",
            });
        }
        if self.gravity.mgal_at_45 <= 0.0 {
            return Err(ValidationError::InvalidParameter {
                name: "mgal_at_45",
                value: self.gravity.mgal_at_45,
                reason: "must be positive",
            });
        }
        if let Some(flexure) = &self.flexure {
            flexure.validate()?;
        }
        Ok(())
    }

    /// Parameters needed by the closed-form admittance for `direction`.
    pub fn validate_theory_inputs(
        &self,
        direction: LoadDirection,
    ) -> Result<(), ValidationError> {
        let purpose = match direction {
            LoadDirection::FromTop => "\"loading from top\" admittance",
            LoadDirection::FromBelow => "\"loading from below\" admittance",
        };
        if !self.field.has_theoretical_admittance() {
            return Err(ValidationError::UnsupportedField {
                field: self.field,
                context: "Theoretical admittance",
            });
        }
        self.require_flexure(purpose)?;
        self.require_moho(purpose)?;
        if direction == LoadDirection::FromBelow {
            self.require_swell(purpose)?;
        }
        Ok(())
    }

    /// Check a forward run producing `product`.
    pub fn validate_forward(
        &self,
        product: ForwardProduct,
        has_density_grid: bool,
    ) -> Result<(), ValidationError> {
        self.validate_common()?;
        match product {
            ForwardProduct::Anomaly => {
                if self.density.is_none() && !has_density_grid {
                    return Err(ValidationError::MissingParameter(
                        "density contrast (constant or grid)".into(),
                    ));
                }
            }
            ForwardProduct::Flexure => {
                self.require_flexure("the flexural surface")?;
            }
            ForwardProduct::Moho => {
                self.require_flexure("the Moho effect")?;
                self.require_moho("the Moho effect")?;
            }
            ForwardProduct::TopLoad => self.validate_theory_inputs(LoadDirection::FromTop)?,
            ForwardProduct::BottomLoad => self.validate_theory_inputs(LoadDirection::FromBelow)?,
        }
        if self.adjustment != Adjustment::None && self.field != FieldType::FreeAir {
            return Err(ValidationError::UnsupportedField {
                field: self.field,
                context: "Slab, Bouguer and far-field adjustment",
            });
        }
        Ok(())
    }

    /// Check an admittance or coherence estimate.
    pub fn validate_spectral(&self, request: &SpectralRequest) -> Result<(), ValidationError> {
        self.validate_common()?;
        if let Some(direction) = request.theory {
            self.validate_theory_inputs(direction)?;
            let flexure = self.require_flexure("theoretical admittance")?;
            if flexure.rho_water == 0.0 || flexure.rho_load == 0.0 || flexure.rho_mantle == 0.0 {
                return Err(ValidationError::MissingParameter(
                    "load, mantle and water densities for theoretical admittance".into(),
                ));
            }
        }
        Ok(())
    }

    /// Check a data-free theoretical curve.
    pub fn validate_theory(&self, request: &TheoryRequest) -> Result<(), ValidationError> {
        self.validate_common()?;
        if request.points == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "points",
                value: 0.0,
                reason: "need at least one point",
            });
        }
        if !(request.spacing > 0.0) {
            return Err(ValidationError::InvalidParameter {
                name: "spacing",
                value: request.spacing,
                reason: "must be positive",
            });
        }
        self.validate_theory_inputs(request.direction)
    }
}
