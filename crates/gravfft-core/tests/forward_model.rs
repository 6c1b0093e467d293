//! Integration tests: forward models against closed-form limits.

use approx::assert_relative_eq;
use gravfft_core::constants::NEWTON_G;
use gravfft_core::engine::Diagnostic;
use gravfft_core::admittance::TheoreticalAdmittance;
use gravfft_core::params::{Adjustment, CompensationDepths, FlexureParams};
use gravfft_core::spectrum::{Dimensions, FftSettings, TrendMode};
use gravfft_core::{
    EngineError, FieldType, ForwardProduct, GravityEngine, Grid, ModelParameters, ValidationError,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn exact_engine() -> GravityEngine {
    GravityEngine::serial().with_fft(FftSettings {
        dimensions: Dimensions::Exact,
        trend: TrendMode::None,
        ..Default::default()
    })
}

fn random_topography(seed: u64, rows: usize, cols: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-800.0..800.0) - 3000.0);
    Grid::with_spacing(data, 1000.0, 1000.0)
}

fn flexure(te: f64) -> FlexureParams {
    FlexureParams {
        te,
        rho_load: 2800.0,
        rho_mantle: 3300.0,
        rho_water: 1030.0,
        rho_infill: None,
    }
}

#[test]
fn test_flat_topography_reproduces_slab() {
    let topo = Grid::with_spacing(Array2::from_elem((3, 3), 1000.0), 100.0, 100.0);
    let params = ModelParameters {
        terms: 1,
        density: Some(1800.0),
        ..Default::default()
    };
    let out = exact_engine()
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    let slab = 1e5 * 2.0 * PI * NEWTON_G * 1800.0 * 1000.0;
    assert_eq!(out.grid.data.dim(), (3, 3));
    for &v in out.grid.data.iter() {
        assert_relative_eq!(v, slab, max_relative = 1e-10);
    }
    assert_eq!(out.grid.header.title, "Gravity anomalies");
    assert_eq!(out.grid.header.z_units, "mGal");
    assert_eq!(out.grid.header.remark, "Parker expansion of order 1");
    assert_eq!(out.z_level, 0.0);
}

#[test]
fn test_single_term_is_linear_in_density() {
    let topo = random_topography(7, 24, 30);
    let engine = GravityEngine::default();
    for field in [
        FieldType::FreeAir,
        FieldType::Vgg,
        FieldType::EastDeflection,
        FieldType::NorthDeflection,
    ] {
        let run = |rho: f64| {
            let params = ModelParameters {
                field,
                terms: 1,
                density: Some(rho),
                ..Default::default()
            };
            engine
                .forward(&params, ForwardProduct::Anomaly, &topo, None)
                .unwrap()
                .grid
                .data
        };
        let a = run(1000.0);
        let b = run(2500.0);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(2.5 * x, *y, max_relative = 1e-9, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_zero_density_gives_zero_field() {
    let topo = random_topography(11, 16, 16);
    let params = ModelParameters {
        terms: 1,
        density: Some(0.0),
        ..Default::default()
    };
    let out = GravityEngine::default()
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    assert!(out.grid.data.iter().all(|&v| v == 0.0));
}

#[test]
fn test_geoid_of_flat_surface_is_finite() {
    let topo = Grid::with_spacing(Array2::from_elem((8, 8), -2500.0), 500.0, 500.0);
    let params = ModelParameters {
        field: FieldType::Geoid,
        density: Some(1700.0),
        ..Default::default()
    };
    let out = exact_engine()
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    for &v in out.grid.data.iter() {
        assert!(v.is_finite());
        assert!(v.abs() < 1e-9);
    }
    assert_eq!(out.grid.header.z_units, "meter");
}

#[test]
fn test_uniform_density_grid_matches_constant() {
    let topo = random_topography(3, 12, 10);
    let rho = topo.with_data(Array2::from_elem((12, 10), 1800.0));
    let params = ModelParameters {
        terms: 2,
        density: Some(1800.0),
        ..Default::default()
    };
    let engine = exact_engine();
    let constant = engine
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    let gridded = engine
        .forward(&params, ForwardProduct::Anomaly, &topo, Some(&rho))
        .unwrap();
    for (a, b) in constant.grid.data.iter().zip(gridded.grid.data.iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-9, epsilon = 1e-9);
    }
}

#[test]
fn test_nans_are_replaced_and_reported() {
    let mut topo = random_topography(5, 10, 10);
    topo.data[[4, 4]] = f64::NAN;
    topo.data[[0, 9]] = f64::NAN;
    let params = ModelParameters {
        density: Some(1000.0),
        ..Default::default()
    };
    let out = GravityEngine::default()
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    assert!(out.grid.data.iter().all(|v| v.is_finite()));
    assert!(out.diagnostics.contains(&Diagnostic::NansReplaced {
        grid: "topography",
        count: 2,
        fallback: 0.0,
    }));
}

#[test]
fn test_mismatched_density_grid_rejected() {
    let topo = random_topography(1, 10, 10);
    let rho = Grid::with_spacing(Array2::from_elem((10, 10), 1800.0), 500.0, 1000.0);
    let params = ModelParameters::default();
    let err = GravityEngine::default()
        .forward(&params, ForwardProduct::Anomaly, &topo, Some(&rho))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::GridMismatch { .. })
    ));
}

#[test]
fn test_airy_flexure_scales_topography() {
    let topo = random_topography(9, 8, 12);
    let params = ModelParameters {
        flexure: Some(flexure(0.0)),
        depths: CompensationDepths {
            moho: Some(25_000.0),
            swell: None,
        },
        ..Default::default()
    };
    let out = exact_engine()
        .forward(&params, ForwardProduct::Flexure, &topo, None)
        .unwrap();
    let ratio = -(2800.0 - 1030.0) / (3300.0 - 2800.0);
    for (w, h) in out.grid.data.iter().zip(topo.data.iter()) {
        assert_relative_eq!(*w, ratio * h - 25_000.0, max_relative = 1e-9);
    }
    assert_eq!(out.terms, 0);
}

#[test]
fn test_thin_plate_approaches_airy() {
    let topo = random_topography(13, 16, 16);
    let run = |te: f64| {
        let params = ModelParameters {
            flexure: Some(flexure(te)),
            ..Default::default()
        };
        exact_engine()
            .forward(&params, ForwardProduct::Flexure, &topo, None)
            .unwrap()
            .grid
            .data
    };
    let airy = run(0.0);
    let thin = run(0.01);
    for (a, b) in airy.iter().zip(thin.iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-6, epsilon = 1e-6);
    }
}

#[test]
fn test_moho_effect_opposes_topography_effect() {
    let mut data = Array2::from_elem((32, 32), -4000.0);
    for r in 12..20 {
        for c in 12..20 {
            data[[r, c]] = -1000.0;
        }
    }
    let topo = Grid::with_spacing(data, 2000.0, 2000.0);
    let params = ModelParameters {
        terms: 1,
        density: Some(1770.0),
        flexure: Some(flexure(0.0)),
        depths: CompensationDepths {
            moho: Some(20_000.0),
            swell: None,
        },
        ..Default::default()
    };
    let engine = GravityEngine::default();
    let surface = engine
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    let moho = engine
        .forward(&params, ForwardProduct::Moho, &topo, None)
        .unwrap();
    assert_relative_eq!(moho.z_level, 20_000.0);
    // Relative to the far field, the load attracts and its root repels.
    let relief = |g: &Grid| g.data[[16, 16]] - g.data[[0, 0]];
    assert!(relief(&surface.grid) > 0.0);
    assert!(relief(&moho.grid) < 0.0);
}

#[test]
fn test_top_load_clamps_terms() {
    let topo = random_topography(21, 16, 16);
    let params = ModelParameters {
        terms: 3,
        flexure: Some(flexure(10_000.0)),
        depths: CompensationDepths {
            moho: Some(20_000.0),
            swell: None,
        },
        ..Default::default()
    };
    let out = GravityEngine::default()
        .forward(&params, ForwardProduct::TopLoad, &topo, None)
        .unwrap();
    assert_eq!(out.terms, 1);
    assert!(out.diagnostics.contains(&Diagnostic::TermsClamped {
        requested: 3,
        used: 1
    }));
    assert!(out.grid.data.iter().all(|v| v.is_finite()));
    assert_eq!(out.grid.header.remark, "Parker expansion of order 1");
}

#[test]
fn test_parameters_from_json() {
    let json = r#"{
        "field": "geoid",
        "terms": 2,
        "flexure": { "te": 15000.0, "rho_load": 2700.0, "rho_mantle": 3300.0, "rho_water": 1000.0 },
        "depths": { "moho": 30000.0 }
    }"#;
    let params: ModelParameters = serde_json::from_str(json).unwrap();
    assert_eq!(params.field, FieldType::Geoid);
    assert_eq!(params.terms, 2);
    assert_eq!(params.depths.moho, Some(30_000.0));
    assert_eq!(params.depths.swell, None);
    assert!(params.validate_forward(ForwardProduct::TopLoad, false).is_ok());
}

#[test]
fn test_density_grid_nans_take_grid_minimum() {
    let topo = random_topography(17, 10, 10);
    let mut rho = topo.with_data(Array2::from_elem((10, 10), 1800.0));
    rho.data[[2, 3]] = 1500.0;
    rho.data[[7, 1]] = f64::NAN;
    let params = ModelParameters {
        terms: 2,
        ..Default::default()
    };
    let engine = exact_engine();
    let out = engine
        .forward(&params, ForwardProduct::Anomaly, &topo, Some(&rho))
        .unwrap();
    assert!(out.diagnostics.contains(&Diagnostic::NansReplaced {
        grid: "density",
        count: 1,
        fallback: 1500.0,
    }));

    let mut filled = rho.clone();
    filled.data[[7, 1]] = 1500.0;
    let expected = engine
        .forward(&params, ForwardProduct::Anomaly, &topo, Some(&filled))
        .unwrap();
    assert!(expected.diagnostics.is_empty());
    for (a, b) in out.grid.data.iter().zip(expected.grid.data.iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn test_water_depth_shifts_topography_before_modelling() {
    let topo = Grid::with_spacing(Array2::from_elem((3, 3), 1000.0), 100.0, 100.0);
    let slab = |h: f64| 1e5 * 2.0 * PI * NEWTON_G * 1800.0 * h;
    let run = |adjustment: Adjustment| {
        let params = ModelParameters {
            terms: 1,
            density: Some(1800.0),
            water_depth: 400.0,
            adjustment,
            ..Default::default()
        };
        exact_engine()
            .forward(&params, ForwardProduct::Anomaly, &topo, None)
            .unwrap()
    };

    let shifted = run(Adjustment::None);
    assert_eq!(shifted.z_level, 0.0);
    assert!(shifted.grid.data.iter().all(|&v| (v - slab(600.0)).abs() < 1e-9));

    // The slab term restores the water column removed from the topography.
    let with_slab = run(Adjustment::Slab);
    assert!(with_slab.grid.data.iter().all(|&v| (v - slab(1000.0)).abs() < 1e-9));

    let bouguer = run(Adjustment::Bouguer);
    assert!(bouguer.grid.data.iter().all(|&v| (v - slab(-200.0)).abs() < 1e-9));

    // Detrending sees the shifted surface.
    let params = ModelParameters {
        density: Some(1800.0),
        water_depth: 400.0,
        ..Default::default()
    };
    let mid = GravityEngine::default()
        .forward(&params, ForwardProduct::Anomaly, &topo, None)
        .unwrap();
    assert_relative_eq!(mid.z_level, 600.0, max_relative = 1e-12);
}

/// Bathymetry with one full cosine cycle across the grid in x.
fn cosine_topography() -> Grid {
    let data = Array2::from_shape_fn((32, 32), |(_, c)| {
        500.0 * (2.0 * PI * c as f64 / 32.0).cos()
    });
    Grid::with_spacing(data, 10_000.0, 10_000.0)
}

#[test]
fn test_bottom_load_follows_theoretical_admittance() {
    let topo = cosine_topography();
    let params = ModelParameters {
        terms: 3,
        flexure: Some(flexure(15_000.0)),
        depths: CompensationDepths {
            moho: Some(20_000.0),
            swell: Some(60_000.0),
        },
        ..Default::default()
    };
    let engine = exact_engine();
    let bottom = engine
        .forward(&params, ForwardProduct::BottomLoad, &topo, None)
        .unwrap();
    let top = engine
        .forward(&params, ForwardProduct::TopLoad, &topo, None)
        .unwrap();

    assert_eq!(bottom.terms, 1);
    assert!(bottom.diagnostics.contains(&Diagnostic::TermsClamped {
        requested: 3,
        used: 1
    }));
    assert_eq!(bottom.z_level, 0.0);

    // A single wavenumber passes through scaled by the admittance at its frequency.
    let model = TheoreticalAdmittance::new(&params, 0.0).unwrap();
    let f0 = 1.0 / 320_000.0;
    let (z_bottom, z_top) = (model.from_below(f0), model.from_top(f0));
    assert!(z_bottom > 0.0 && z_top > 0.0);
    assert!(z_bottom > z_top, "loading from below is less compensated at long wavelengths");
    for ((b, t), h) in bottom
        .grid
        .data
        .iter()
        .zip(top.grid.data.iter())
        .zip(topo.data.iter())
    {
        assert_relative_eq!(*b, z_bottom * h, max_relative = 1e-8, epsilon = 1e-8);
        assert_relative_eq!(*t, z_top * h, max_relative = 1e-8, epsilon = 1e-8);
    }
}
