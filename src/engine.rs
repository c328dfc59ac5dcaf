//! # Correspondence engine
//!
//! The single entry point run once per frame. The engine owns one algorithm, selected by
//! configuration, together with all of that algorithm's scratch buffers and output.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{
    canny::{Canny, CannyParams},
    colour::{ColourParams, SimpleColour},
    dense::{Dense, DenseParams},
    geometric::{Geometric, GeometricParams},
    ladder::{Edges, EdgesParams},
    simple::{Simple, SimpleParams},
    simple2::{Simple2, Simple2Params}
};
use crate::disparity::*;
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Which algorithm to run, and its parameters.
///
/// Deserialises from an object tagged with `"algorithm"`, for example
/// `{"algorithm": "dense", "max_disparity_percent": 15}`. Missing parameters take their
/// defaults.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum EngineConfig {
    Simple(SimpleParams),
    Simple2(Simple2Params),
    SimpleColour(ColourParams),
    Canny(CannyParams),
    Edges(EdgesParams),
    Dense(DenseParams),
    Geometric(GeometricParams)
}

/// The closed set of correspondence algorithms.
pub enum Algorithm {
    Simple(Simple),
    Simple2(Simple2),
    SimpleColour(SimpleColour),
    Canny(Canny),
    Edges(Edges),
    Dense(Dense),
    Geometric(Geometric)
}

pub struct CorrespondenceEngine {
    algorithm: Algorithm
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::Simple(SimpleParams::default())
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Name of the selected algorithm, as used in the `"algorithm"` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EngineConfig::Simple(_) => "simple",
            EngineConfig::Simple2(_) => "simple2",
            EngineConfig::SimpleColour(_) => "simple_colour",
            EngineConfig::Canny(_) => "canny",
            EngineConfig::Edges(_) => "edges",
            EngineConfig::Dense(_) => "dense",
            EngineConfig::Geometric(_) => "geometric"
        }
    }
}

impl Algorithm {
    pub fn new(config: EngineConfig) -> Self {
        match config {
            EngineConfig::Simple(p) => Algorithm::Simple(Simple::new(p)),
            EngineConfig::Simple2(p) => Algorithm::Simple2(Simple2::new(p)),
            EngineConfig::SimpleColour(p) => Algorithm::SimpleColour(SimpleColour::new(p)),
            EngineConfig::Canny(p) => Algorithm::Canny(Canny::new(p)),
            EngineConfig::Edges(p) => Algorithm::Edges(Edges::new(p)),
            EngineConfig::Dense(p) => Algorithm::Dense(Dense::new(p)),
            EngineConfig::Geometric(p) => Algorithm::Geometric(Geometric::new(p))
        }
    }

    fn inner(&self) -> &dyn CorrespondenceAlgorithm {
        match self {
            Algorithm::Simple(a) => a,
            Algorithm::Simple2(a) => a,
            Algorithm::SimpleColour(a) => a,
            Algorithm::Canny(a) => a,
            Algorithm::Edges(a) => a,
            Algorithm::Dense(a) => a,
            Algorithm::Geometric(a) => a
        }
    }

    fn inner_mut(&mut self) -> &mut dyn CorrespondenceAlgorithm {
        match self {
            Algorithm::Simple(a) => a,
            Algorithm::Simple2(a) => a,
            Algorithm::SimpleColour(a) => a,
            Algorithm::Canny(a) => a,
            Algorithm::Edges(a) => a,
            Algorithm::Dense(a) => a,
            Algorithm::Geometric(a) => a
        }
    }
}

impl CorrespondenceAlgorithm for Algorithm {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        self.inner_mut().update(frame, calib)
    }

    fn features(&self) -> &[StereoFeature] {
        self.inner().features()
    }

    fn disparity_map(&self) -> Option<&DisparityMap> {
        self.inner().disparity_map()
    }

    fn scratch_generation(&self) -> u64 {
        self.inner().scratch_generation()
    }
}

impl CorrespondenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        log::debug!("Creating correspondence engine running {}", config.name());

        Self {
            algorithm: Algorithm::new(config)
        }
    }

    /// Build an engine from a JSON configuration, see [`EngineConfig`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(EngineConfig::from_json(json)?))
    }

    /// Process one frame pair.
    ///
    /// `left` and `right` are row-major buffers of either one or three interleaved samples per
    /// pixel. The previous output is replaced on success. If the frame is malformed an error is
    /// returned and the previous output is kept.
    pub fn update(
        &mut self,
        left: &[u8],
        right: &[u8],
        width: usize,
        height: usize,
        calib_dx: f32,
        calib_dy: f32
    ) -> Result<()> {
        self.algorithm.update(
            &StereoFrame::new(left, right, width, height),
            Calibration::new(calib_dx, calib_dy)
        )
    }

    /// Stereo features from the last frame. Empty for dense algorithms.
    pub fn features(&self) -> &[StereoFeature] {
        self.algorithm.features()
    }

    /// Dense disparity map from the last frame, for algorithms which produce one.
    pub fn disparity_map(&self) -> Option<&DisparityMap> {
        self.algorithm.disparity_map()
    }

    /// Number of times scratch buffers have been resized for a new geometry.
    pub fn scratch_generation(&self) -> u64 {
        self.algorithm.scratch_generation()
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut Algorithm {
        &mut self.algorithm
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_tags() {
        let config = EngineConfig::from_json(r#"{"algorithm": "simple_colour"}"#).unwrap();
        assert_eq!(config.name(), "simple_colour");

        let config = EngineConfig::from_json(
            r#"{"algorithm": "dense", "max_disparity_percent": 15, "gabor": {"no_of_masks": 2}}"#
        ).unwrap();
        match config {
            EngineConfig::Dense(p) => {
                assert_eq!(p.max_disparity_percent, 15);
                assert_eq!(p.gabor.no_of_masks, 2);
                assert_eq!(p.minimum_intensity, 10);
            },
            other => panic!("Parsed as {}", other.name())
        }
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"algorithm": "sgbm"}"#),
            Err(Error::Config(_))
        ));
        assert!(CorrespondenceEngine::from_json("not json").is_err());
    }

    #[test]
    fn config_survives_serialisation() {
        let config = EngineConfig::Edges(EdgesParams::default());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""algorithm":"edges""#));
        assert_eq!(EngineConfig::from_json(&json).unwrap().name(), "edges");
    }

    #[test]
    fn only_dense_has_a_map() {
        let dense = CorrespondenceEngine::new(EngineConfig::Dense(DenseParams::default()));
        let simple = CorrespondenceEngine::new(EngineConfig::default());

        assert!(dense.disparity_map().is_some());
        assert!(simple.disparity_map().is_none());
    }
}
