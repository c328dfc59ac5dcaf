//! # Correspondence algorithms
//!
//! The closed set of stereo correspondence algorithms. Each one owns its parameters, scratch
//! buffers and output, and implements [`CorrespondenceAlgorithm`](crate::prelude::CorrespondenceAlgorithm).

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod canny;
pub mod colour;
pub mod dense;
pub mod geometric;
pub mod ladder;
pub mod simple;
pub mod simple2;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::disparity::{Calibration, StereoFrame};
use crate::error::*;
use crate::matcher::Match;
use crate::row_features::{RowFeature, RowFeatureExtractor, RowFeatureParams};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Per-row scratch shared by the row feature based algorithms.
pub(crate) struct RowScratch {
    pub extractor: RowFeatureExtractor,
    pub left_features: Vec<RowFeature>,
    pub right_features: Vec<RowFeature>,
    pub left_x: Vec<usize>,
    pub right_x: Vec<usize>,
    pub matches: Vec<Match>,
    pub backward: Vec<Match>
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Check the frame layout and calibration, logging and returning the problem if either is
/// unusable.
///
/// With `channels` set the frame must have exactly that many samples per pixel, otherwise
/// mono and colour frames are both accepted. Returns the frame's channel count.
pub(crate) fn validate(
    frame: &StereoFrame,
    calib: &Calibration,
    channels: Option<usize>,
    algorithm: &str
) -> Result<usize> {
    let result = match channels {
        Some(c) => frame.require_channels(c).map(|_| c),
        None => frame.channels()
    }
    .and_then(|c| calib.check(frame.width, frame.height).map(|_| c));

    if let Err(e) = &result {
        log::warn!("{}: skipping frame, {}", algorithm, e);
    }

    result
}

/// Row `y + dy`, if it lies inside an image of `height` rows.
pub(crate) fn shifted_row(y: usize, dy: isize, height: usize) -> Option<usize> {
    let yr = y as isize + dy;

    if yr >= 0 && (yr as usize) < height {
        Some(yr as usize)
    }
    else {
        None
    }
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl RowScratch {
    pub fn new(params: RowFeatureParams) -> Self {
        Self {
            extractor: RowFeatureExtractor::new(params),
            left_features: Vec::new(),
            right_features: Vec::new(),
            left_x: Vec::new(),
            right_x: Vec::new(),
            matches: Vec::new(),
            backward: Vec::new()
        }
    }

    /// Extract the row features of a left/right row pair and clear the match lists.
    pub fn extract(&mut self, left_row: &[u8], right_row: &[u8]) {
        self.extractor.extract(left_row, &mut self.left_features);
        self.extractor.extract(right_row, &mut self.right_features);

        self.left_x.clear();
        self.left_x.extend(self.left_features.iter().map(|f| f.x));
        self.right_x.clear();
        self.right_x.extend(self.right_features.iter().map(|f| f.x));

        self.matches.clear();
        self.backward.clear();
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_shift_bounds() {
        assert_eq!(shifted_row(5, -2, 10), Some(3));
        assert_eq!(shifted_row(1, -2, 10), None);
        assert_eq!(shifted_row(8, 2, 10), None);
        assert_eq!(shifted_row(7, 2, 10), Some(9));
    }

    #[test]
    fn validation_reports_channels() {
        let mono = vec![0u8; 6];
        let frame = StereoFrame::new(&mono, &mono, 3, 2);

        let calib = Calibration::default();

        assert_eq!(validate(&frame, &calib, None, "test").unwrap(), 1);
        assert!(validate(&frame, &calib, Some(3), "test").is_err());
    }

    #[test]
    fn validation_rejects_unusable_calibration() {
        let mono = vec![0u8; 64 * 48];
        let frame = StereoFrame::new(&mono, &mono, 64, 48);

        for &(dx, dy) in &[
            (1e30, 0.0),
            (0.0, 1e30),
            (-1e30, 0.0),
            (f32::NAN, 0.0),
            (0.0, f32::NEG_INFINITY),
            (64.0, 0.0),
            (0.0, -48.0)
        ] {
            assert!(
                matches!(
                    validate(&frame, &Calibration::new(dx, dy), None, "test"),
                    Err(Error::Calibration { .. })
                ),
                "({}, {}) accepted", dx, dy
            );
        }

        assert!(validate(&frame, &Calibration::new(-63.0, 47.0), None, "test").is_ok());
    }
}
