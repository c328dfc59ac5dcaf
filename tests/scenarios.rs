//! # Scenarios
//!
//! Runs the engine over synthetic frame pairs with known geometry and checks the output.

use cv_correspondence::prelude::*;
use cv_correspondence::algorithms::{
    canny::CannyParams, colour::ColourParams, dense::DenseParams, geometric::GeometricParams,
    ladder::EdgesParams, simple::SimpleParams, simple2::Simple2Params
};
use cv_correspondence::corners::CornerParams;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dark left of `edge`, bright from `edge` onwards.
fn step(width: usize, height: usize, edge: usize) -> Vec<u8> {
    (0..width * height)
        .map(|i| if i % width < edge { 50 } else { 200 })
        .collect()
}

/// Hashed texture, `shift` pixels to the left of the unshifted one.
fn texture(width: usize, height: usize, shift: usize) -> Vec<u8> {
    (0..width * height)
        .map(|i| {
            let (x, y) = ((i % width + shift) as u32, (i / width) as u32);
            let mut h = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(2_246_822_519);
            h = (h ^ (h >> 15)).wrapping_mul(3_266_489_917);
            (h >> 24) as u8
        })
        .collect()
}

/// Grid of squares with distinct brightness on a dark background.
fn squares(width: usize, height: usize) -> Vec<u8> {
    let mut img = vec![20u8; width * height];

    for k in 0..16 {
        let (x0, y0) = (20 + 35 * (k % 4), 12 + 26 * (k / 4));
        for y in y0..y0 + 10 {
            for x in x0..x0 + 10 {
                img[y * width + x] = 40 + 12 * k as u8;
            }
        }
    }

    img
}

fn to_rgb(mono: &[u8]) -> Vec<u8> {
    mono.iter().flat_map(|&v| vec![v, v, v]).collect()
}

fn sparse_configs() -> Vec<EngineConfig> {
    vec![
        EngineConfig::Simple(SimpleParams::default()),
        EngineConfig::Simple2(Simple2Params::default()),
        EngineConfig::SimpleColour(ColourParams::default()),
        EngineConfig::Canny(CannyParams::default()),
        EngineConfig::Edges(EdgesParams::default()),
        EngineConfig::Geometric(GeometricParams::default())
    ]
}

#[test]
fn flat_frames_give_no_features() {
    init_logging();

    let flat = vec![100u8; 64 * 48];
    let flat_rgb = to_rgb(&flat);

    for config in sparse_configs() {
        let name = config.name();
        let mut engine = CorrespondenceEngine::new(config);

        let buf = if name == "simple_colour" { &flat_rgb } else { &flat };
        engine.update(buf, buf, 64, 48, 0.0, 0.0).unwrap();

        assert!(engine.features().is_empty(), "{} found features", name);
    }
}

#[test]
fn shifted_edge_gives_one_feature_per_row() {
    init_logging();

    let left = step(64, 48, 30);
    let right = step(64, 48, 25);

    for config in vec![
        EngineConfig::Simple(SimpleParams::default()),
        EngineConfig::Simple2(Simple2Params::default()),
        EngineConfig::Edges(EdgesParams::default())
    ] {
        let name = config.name();
        let mut engine = CorrespondenceEngine::new(config);
        engine.update(&left, &right, 64, 48, 0.0, 0.0).unwrap();

        let features = engine.features();
        assert_eq!(features.len(), 48, "{}", name);

        for (y, f) in features.iter().enumerate() {
            assert_eq!(f.y, y as f32, "{}", name);
            assert!((f.x - 29.0).abs() <= 1.0, "{}: x = {}", name, f.x);
            assert_eq!(f.disparity, 5.0, "{}", name);
        }
    }
}

#[test]
fn colour_algorithm_rejects_mono_frames() {
    init_logging();

    let left = step(64, 48, 30);
    let right = step(64, 48, 25);
    let mut engine = CorrespondenceEngine::new(EngineConfig::SimpleColour(ColourParams::default()));

    let result = engine.update(&left, &right, 64, 48, 0.0, 0.0);

    assert!(matches!(result, Err(Error::BufferSize { .. })));
    assert!(engine.features().is_empty());
}

#[test]
fn malformed_frames_are_rejected() {
    init_logging();

    let good = vec![0u8; 64 * 48];
    let short = vec![0u8; 64 * 47];
    let mut engine = CorrespondenceEngine::new(EngineConfig::default());

    assert!(matches!(
        engine.update(&good, &short, 64, 48, 0.0, 0.0),
        Err(Error::FrameMismatch { .. })
    ));
    assert!(matches!(
        engine.update(&good, &good, 0, 48, 0.0, 0.0),
        Err(Error::Dimensions { .. })
    ));
    assert!(engine.update(&short, &short, 64, 48, 0.0, 0.0).is_err());
    assert_eq!(engine.scratch_generation(), 0);
}

#[test]
fn dense_identical_frames_give_zero_map() {
    init_logging();

    let img = texture(320, 240, 0);
    let mut engine = CorrespondenceEngine::new(EngineConfig::Dense(DenseParams::default()));

    engine.update(&img, &img, 320, 240, 0.0, 0.0).unwrap();

    let map = engine.disparity_map().unwrap();
    assert_eq!(map.as_bytes().len(), 320 * 240 * 3);
    assert!(engine.features().is_empty());

    let zero = map.as_bytes().iter().filter(|&&v| v == 0).count();
    assert!(zero * 100 >= map.as_bytes().len() * 99, "only {} zero", zero);
}

#[test]
fn fast_threshold_converges() {
    init_logging();

    let img = squares(160, 120);
    let mut engine = CorrespondenceEngine::new(EngineConfig::Geometric(GeometricParams {
        corners: CornerParams {
            required_fast_features: 100,
            ..CornerParams::default()
        },
        ..GeometricParams::default()
    }));

    let threshold = |engine: &CorrespondenceEngine| match engine.algorithm() {
        Algorithm::Geometric(g) => (g.fast_threshold(), g.fast_count()),
        _ => unreachable!()
    };

    for _ in 0..300 {
        engine.update(&img, &img, 160, 120, 0.0, 0.0).unwrap();
    }
    let (settled, count) = threshold(&engine);

    for _ in 0..5 {
        engine.update(&img, &img, 160, 120, 0.0, 0.0).unwrap();
        assert_eq!(threshold(&engine).0, settled);
    }
    assert!((count as isize - 100).abs() <= 100, "{} corners", count);
}

#[test]
fn sparse_output_stays_in_bounds() {
    init_logging();

    let (w, h) = (96, 40);
    let left = texture(w, h, 0);
    let right = texture(w, h, 7);
    let (left_rgb, right_rgb) = (to_rgb(&left), to_rgb(&right));
    let max_disp = max_disparity_pixels(w, 30) as f32;

    for config in sparse_configs() {
        let name = config.name();
        let mut engine = CorrespondenceEngine::new(config);

        for &(dx, dy) in &[(0.0, 0.0), (2.0, 1.0), (-3.0, -2.0)] {
            if name == "simple_colour" {
                engine.update(&left_rgb, &right_rgb, w, h, dx, dy).unwrap();
            }
            else {
                engine.update(&left, &right, w, h, dx, dy).unwrap();
            }

            for f in engine.features() {
                assert!(f.x >= 0.0 && f.x < w as f32, "{}: x = {}", name, f.x);
                assert!(f.y >= 0.0 && f.y < h as f32, "{}: y = {}", name, f.y);
                assert!(
                    f.disparity >= 0.0 && f.disparity < max_disp,
                    "{}: d = {}", name, f.disparity
                );
            }
        }
    }
}

#[test]
fn out_of_range_calibration_is_rejected() {
    init_logging();

    let left = step(64, 48, 30);
    let right = step(64, 48, 25);
    let texture_img = texture(64, 48, 0);
    let rgb = to_rgb(&left);

    let mut configs = sparse_configs();
    configs.push(EngineConfig::Dense(DenseParams::default()));

    for config in configs {
        let name = config.name();
        let mut engine = CorrespondenceEngine::new(config);
        let (l, r) = if name == "simple_colour" { (&rgb, &rgb) } else { (&left, &right) };

        engine.update(l, r, 64, 48, 0.0, 0.0).unwrap();
        let before = engine.features().to_vec();

        for &(dx, dy) in &[(1e30, 0.0), (0.0, 1e30), (-1e30, 0.0), (f32::INFINITY, 0.0), (0.0, f32::NAN)] {
            assert!(
                matches!(engine.update(l, r, 64, 48, dx, dy), Err(Error::Calibration { .. })),
                "{} accepted ({}, {})", name, dx, dy
            );
            assert_eq!(engine.features(), &before[..], "{}", name);
        }

        // Largest offsets that still fit the image are processed normally
        let (l, r) = if name == "simple_colour" { (&rgb, &rgb) } else { (&texture_img, &texture_img) };
        engine.update(l, r, 64, 48, -63.0, 47.0).unwrap();
        engine.update(l, r, 64, 48, 63.0, -47.0).unwrap();
    }
}
