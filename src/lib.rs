//! # Stereo Correspondence
//!
//! This crate finds correspondences between the images of a rectified stereo pair, producing
//! either sparse stereo features or a dense disparity map each frame.
//!
//! Pick an algorithm with an [`EngineConfig`](engine::EngineConfig), build a
//! [`CorrespondenceEngine`](engine::CorrespondenceEngine) from it and call `update` once per
//! captured frame.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod algorithms;
pub mod corners;
mod disparity;
pub mod edges;
pub mod engine;
mod error;
pub mod gabor;
pub mod matcher;
pub mod mono;
pub mod row_features;
pub mod scratch;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub mod prelude {
    pub use crate::disparity::{
        max_disparity_pixels,
        Calibration,
        CorrespondenceAlgorithm,
        DisparityMap,
        StereoFeature,
        StereoFrame
    };
    pub use crate::engine::{Algorithm, CorrespondenceEngine, EngineConfig};
    pub use crate::error::{Error, Result};
}
