//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the correspondence crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Image buffer has {actual} samples but {expected} were expected")]
    BufferSize {
        expected: usize,
        actual: usize
    },

    #[error("Image dimensions {width}x{height} are not usable")]
    Dimensions {
        width: usize,
        height: usize
    },

    #[error("Left and right images differ in length ({left} vs {right} samples)")]
    FrameMismatch {
        left: usize,
        right: usize
    },

    #[error("Calibration offset ({dx}, {dy}) does not fit a {width}x{height} image")]
    Calibration {
        dx: f32,
        dy: f32,
        width: usize,
        height: usize
    },

    #[error("Could not parse engine configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[cfg(feature = "statistics")]
    #[error("Statistics plotting failed: {0}")]
    Statistics(String)
}
