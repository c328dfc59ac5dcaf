//! # Engine lifecycle
//!
//! Configuration loading, buffer reuse across frames and output replacement.

use cv_correspondence::prelude::*;

fn step(width: usize, height: usize, edge: usize) -> Vec<u8> {
    (0..width * height)
        .map(|i| if i % width < edge { 50 } else { 200 })
        .collect()
}

const ALL: [&str; 7] = ["simple", "simple2", "simple_colour", "canny", "edges", "dense", "geometric"];

#[test]
fn every_algorithm_loads_from_json() {
    for name in ALL.iter() {
        let json = format!(r#"{{"algorithm": "{}"}}"#, name);
        let engine = CorrespondenceEngine::from_json(&json).unwrap();

        assert_eq!(engine.disparity_map().is_some(), *name == "dense");
    }
}

#[test]
fn partial_config_overrides_defaults() {
    let config = EngineConfig::from_json(r#"{
        "algorithm": "simple",
        "matching": { "max_disparity_percent": 10 },
        "features": { "minimum_response": 500 }
    }"#).unwrap();

    match config {
        EngineConfig::Simple(p) => {
            assert_eq!(p.matching.max_disparity_percent, 10);
            assert_eq!(p.matching.compare_radius, 3);
            assert_eq!(p.features.minimum_response, 500);
            assert_eq!(p.features.summation_radius, 3);
        },
        other => panic!("Parsed as {}", other.name())
    }
}

#[test]
fn disparity_limit_from_config_applies() {
    // 64 * 5 / 100 = 3 pixels, so the 5 pixel shift is out of range
    let mut engine = CorrespondenceEngine::from_json(
        r#"{"algorithm": "simple", "matching": {"max_disparity_percent": 5}}"#
    ).unwrap();

    engine.update(&step(64, 48, 30), &step(64, 48, 25), 64, 48, 0.0, 0.0).unwrap();
    assert!(engine.features().is_empty());
}

#[test]
fn buffers_are_reused_until_geometry_changes() {
    for name in ALL.iter() {
        let mut engine = CorrespondenceEngine::from_json(
            &format!(r#"{{"algorithm": "{}"}}"#, name)
        ).unwrap();
        let channels = if *name == "simple_colour" { 3 } else { 1 };

        let small = vec![90u8; 160 * 120 * channels];
        let large = vec![90u8; 200 * 150 * channels];

        assert_eq!(engine.scratch_generation(), 0);

        for _ in 0..3 {
            engine.update(&small, &small, 160, 120, 0.0, 0.0).unwrap();
            assert_eq!(engine.scratch_generation(), 1, "{}", name);
        }

        engine.update(&large, &large, 200, 150, 0.0, 0.0).unwrap();
        assert_eq!(engine.scratch_generation(), 2, "{}", name);

        engine.update(&small, &small, 160, 120, 0.0, 0.0).unwrap();
        assert_eq!(engine.scratch_generation(), 3, "{}", name);
    }
}

#[test]
fn rejected_frame_keeps_previous_output() {
    let left = step(64, 48, 30);
    let right = step(64, 48, 25);
    let mut engine = CorrespondenceEngine::new(EngineConfig::default());

    engine.update(&left, &right, 64, 48, 0.0, 0.0).unwrap();
    let before: Vec<StereoFeature> = engine.features().to_vec();
    assert!(!before.is_empty());

    assert!(engine.update(&left, &right[..100], 64, 48, 0.0, 0.0).is_err());
    assert_eq!(engine.features(), &before[..]);
    assert_eq!(engine.scratch_generation(), 1);
}

#[test]
fn dense_map_converts_to_images() {
    let mut engine = CorrespondenceEngine::new(EngineConfig::Dense(Default::default()));
    let flat = vec![128u8; 160 * 120];

    engine.update(&flat, &flat, 160, 120, 0.0, 0.0).unwrap();

    let map = engine.disparity_map().unwrap();
    assert_eq!(map.to_luma().dimensions(), (160, 120));
    assert_eq!(map.to_rgb().dimensions(), (160, 120));
}
