//! Integration tests: admittance, coherence and theoretical curves.

use approx::assert_relative_eq;
use gravfft_core::admittance::{
    FrequencyAxis, LoadDirection, SpectralQuantity, SpectralRequest, TheoryRequest,
};
use gravfft_core::constants::NEWTON_G;
use gravfft_core::params::{CompensationDepths, FlexureParams};
use gravfft_core::{EngineError, FieldType, GravityEngine, Grid, ModelParameters, ValidationError};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn random_grid(seed: u64, n: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0) * 500.0);
    Grid::with_spacing(data, 2000.0, 2000.0)
}

fn plate_model(field: FieldType) -> ModelParameters {
    ModelParameters {
        field,
        flexure: Some(FlexureParams {
            te: 12_000.0,
            rho_load: 2800.0,
            rho_mantle: 3300.0,
            rho_water: 1030.0,
            rho_infill: None,
        }),
        depths: CompensationDepths {
            moho: Some(22_000.0),
            swell: Some(70_000.0),
        },
        ..Default::default()
    }
}

fn request(quantity: SpectralQuantity) -> SpectralRequest {
    SpectralRequest {
        quantity,
        theory: None,
        axis: FrequencyAxis::default(),
    }
}

#[test]
fn test_identical_grids_are_perfectly_coherent() {
    let a = random_grid(42, 64);
    let b = a.clone();
    let engine = GravityEngine::default();
    let params = ModelParameters::default();

    let adm = engine
        .cross_spectrum(&params, &request(SpectralQuantity::Admittance), &a, &b)
        .unwrap();
    assert_eq!(adm.result.rows.len(), 32);
    assert_eq!(adm.result.n_columns(), 3);
    for row in &adm.result.rows {
        assert_relative_eq!(row.value, 1.0, epsilon = 1e-12);
        assert_relative_eq!(row.error, 0.0, epsilon = 1e-9);
        assert!(row.theoretical.is_none());
    }

    let coh = engine
        .cross_spectrum(&params, &request(SpectralQuantity::Coherence), &a, &b)
        .unwrap();
    for row in &coh.result.rows {
        assert_relative_eq!(row.value, 1.0, epsilon = 1e-12);
        assert_relative_eq!(row.error, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_unrelated_grids_coherence_in_unit_interval() {
    let engine = GravityEngine::default();
    let out = engine
        .cross_spectrum(
            &ModelParameters::default(),
            &request(SpectralQuantity::Coherence),
            &random_grid(1, 48),
            &random_grid(2, 48),
        )
        .unwrap();
    for row in &out.result.rows {
        assert!(row.value >= -1e-12 && row.value <= 1.0 + 1e-12, "coherence {}", row.value);
        assert!(row.error >= 0.0);
    }
    // Frequencies increase bin by bin.
    for pair in out.result.rows.windows(2) {
        assert!(pair[1].frequency > pair[0].frequency);
    }
}

#[test]
fn test_wavelength_axis_in_km() {
    let a = random_grid(3, 32);
    let axis = FrequencyAxis {
        wavelength: true,
        kilometres: true,
    };
    let req = SpectralRequest {
        axis,
        ..request(SpectralQuantity::Admittance)
    };
    let out = GravityEngine::default()
        .cross_spectrum(&ModelParameters::default(), &req, &a, &a)
        .unwrap();
    // First bin: one full cycle across the 64 km padded grid.
    assert_relative_eq!(out.result.rows[0].frequency, 64.0, max_relative = 1e-12);
}

#[test]
fn test_theory_column_added() {
    let topo = random_grid(5, 32);
    let field = random_grid(6, 32);
    let req = SpectralRequest {
        theory: Some(LoadDirection::FromBelow),
        ..request(SpectralQuantity::Admittance)
    };
    let out = GravityEngine::default()
        .cross_spectrum(&plate_model(FieldType::FreeAir), &req, &topo, &field)
        .unwrap();
    assert_eq!(out.result.n_columns(), 4);
    assert!(out
        .result
        .rows
        .iter()
        .all(|r| r.theoretical.map_or(false, f64::is_finite)));
}

#[test]
fn test_theory_for_vgg_is_rejected() {
    let a = random_grid(7, 16);
    let req = SpectralRequest {
        theory: Some(LoadDirection::FromTop),
        ..request(SpectralQuantity::Admittance)
    };
    let err = GravityEngine::default()
        .cross_spectrum(&plate_model(FieldType::Vgg), &req, &a, &a)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::UnsupportedField { .. })
    ));
}

#[test]
fn test_mismatched_grids_rejected() {
    let err = GravityEngine::default()
        .cross_spectrum(
            &ModelParameters::default(),
            &request(SpectralQuantity::Coherence),
            &random_grid(1, 16),
            &random_grid(1, 20),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::GridMismatch { .. })
    ));
}

#[test]
fn test_theoretical_curve_without_data() {
    let engine = GravityEngine::default();
    let req = TheoryRequest {
        direction: LoadDirection::FromTop,
        points: 200,
        spacing: 1000.0,
        mean_depth: 4000.0,
        axis: FrequencyAxis::default(),
    };
    let curve = engine
        .theoretical_curve(&plate_model(FieldType::FreeAir), &req)
        .unwrap();
    assert_eq!(curve.points.len(), 200);
    assert_relative_eq!(curve.points[0].frequency, 1.0 / 200_000.0, max_relative = 1e-12);

    // Short wavelengths see the uncompensated load.
    let last = curve.points[199];
    let expected =
        1e5 * 2.0 * PI * NEWTON_G * 1770.0 * (-2.0 * PI * last.frequency * 4000.0).exp();
    assert_relative_eq!(last.value, expected, max_relative = 1e-3);
    // Long wavelengths are partly compensated.
    let first = curve.points[0];
    let uncompensated =
        1e5 * 2.0 * PI * NEWTON_G * 1770.0 * (-2.0 * PI * first.frequency * 4000.0).exp();
    assert!(first.value > 0.0 && first.value < uncompensated);
}

#[test]
fn test_theoretical_curve_needs_swell_depth_from_below() {
    let mut params = plate_model(FieldType::Geoid);
    params.depths.swell = None;
    let req = TheoryRequest {
        direction: LoadDirection::FromBelow,
        points: 10,
        spacing: 1000.0,
        mean_depth: 0.0,
        axis: FrequencyAxis::default(),
    };
    assert!(GravityEngine::default().theoretical_curve(&params, &req).is_err());
    params.depths.swell = Some(50_000.0);
    assert!(GravityEngine::default().theoretical_curve(&params, &req).is_ok());
}

#[test]
fn test_result_serialises_without_empty_theory_column() {
    let a = random_grid(8, 16);
    let out = GravityEngine::default()
        .cross_spectrum(
            &ModelParameters::default(),
            &request(SpectralQuantity::Admittance),
            &a,
            &a,
        )
        .unwrap();
    let json = serde_json::to_string(&out.result).unwrap();
    assert!(!json.contains("theoretical"));
    let back: gravfft_core::admittance::AdmittanceResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.rows.len(), out.result.rows.len());
    assert_eq!(back.quantity, SpectralQuantity::Admittance);
}

#[test]
fn test_empty_bin_survives_json() {
    use gravfft_core::admittance::{AdmittanceResult, AdmittanceRow};

    let result = AdmittanceResult {
        quantity: SpectralQuantity::Coherence,
        axis: FrequencyAxis::default(),
        direction: None,
        rows: vec![
            AdmittanceRow {
                frequency: 1e-5,
                value: 0.8,
                error: 0.05,
                theoretical: None,
            },
            AdmittanceRow {
                frequency: 2e-5,
                value: f64::NAN,
                error: f64::NAN,
                theoretical: None,
            },
        ],
    };
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"value\":null"));

    let back: AdmittanceResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.rows[0], result.rows[0]);
    assert_relative_eq!(back.rows[1].frequency, 2e-5);
    assert!(back.rows[1].value.is_nan());
    assert!(back.rows[1].error.is_nan());
}

#[test]
fn test_water_depth_moves_mean_level_only() {
    let topo = random_grid(9, 32).offset(-3000.0);
    let field = random_grid(10, 32);
    let engine = GravityEngine::default();
    let run = |water_depth: f64| {
        let params = ModelParameters {
            water_depth,
            ..Default::default()
        };
        engine
            .cross_spectrum(&params, &request(SpectralQuantity::Admittance), &topo, &field)
            .unwrap()
    };
    let dry = run(0.0);
    let wet = run(1000.0);
    assert_relative_eq!(wet.z_level, dry.z_level + 1000.0, max_relative = 1e-12);
    // A constant shift is removed with the trend, so the estimate is unchanged.
    for (a, b) in dry.result.rows.iter().zip(wet.result.rows.iter()) {
        assert_relative_eq!(a.value, b.value, max_relative = 1e-9, epsilon = 1e-12);
    }
}
