//! Physical constants and unit conversions.

/// Newtonian gravitational constant (m³ kg⁻¹ s⁻²).
pub const NEWTON_G: f64 = 6.674e-11;

/// Young's modulus of the lithosphere (Pa).
pub const YOUNGS_MODULUS: f64 = 7.0e10;

/// Poisson's ratio of the lithosphere.
pub const POISSONS_RATIO: f64 = 0.25;

/// Moritz (1980) IGF normal gravity at 45° latitude, in mGal.
pub const MGAL_AT_45: f64 = 980_619.9203;

/// Mean Earth radius of the GRS-80 sphere (m).
pub const EARTH_RADIUS: f64 = 6_371_008.7714;

/// An elastic thickness above this value is read as a flexural rigidity (N·m).
pub const RIGIDITY_THRESHOLD: f64 = 1.0e10;

/// m/s² → mGal.
pub const MGAL_PER_MS2: f64 = 1.0e5;

/// mGal/m → Eötvös (0.1 mGal/km).
pub const EOTVOS_PER_MGAL_PER_M: f64 = 1.0e4;

/// radians → microradians.
pub const MICRORADIANS: f64 = 1.0e6;

/// Largest accepted order of the Parker expansion.
pub const MAX_TERMS: u32 = 10;

/// Default order of the Parker expansion.
pub const DEFAULT_TERMS: u32 = 3;

/// Flexural rigidity of an elastic plate of thickness `te` (m).
///
/// $D = \frac{E T_e^3}{12 (1 - \nu^2)}$
pub fn flexural_rigidity(te: f64) -> f64 {
    YOUNGS_MODULUS * te.powi(3) / (12.0 * (1.0 - POISSONS_RATIO * POISSONS_RATIO))
}

/// Equivalent elastic thickness of a plate with rigidity `d` (N·m).
pub fn elastic_thickness(d: f64) -> f64 {
    (12.0 * (1.0 - POISSONS_RATIO * POISSONS_RATIO) * d / YOUNGS_MODULUS).cbrt()
}
