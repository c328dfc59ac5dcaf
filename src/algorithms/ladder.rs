//! # Threshold ladder edge matching
//!
//! Edges are found per row with the threshold ladder, using a threshold derived from the
//! global contrast of the left image, and only edges of the same polarity are compared.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{shifted_row, validate};
use crate::disparity::*;
use crate::edges::{auto_threshold, ladder_edges, smooth_row, EdgeFeature};
use crate::error::*;
use crate::matcher::*;
use crate::mono::{self, ChannelOrder, MonoMode};
use crate::scratch::{ensure_len, ScratchArena};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgesParams {
    /// Largest radius on the ladder; radii run down to 2.
    pub edge_detection_radius: usize,

    pub matching: MatchParams
}

pub struct Edges {
    params: EdgesParams,
    arena: ScratchArena,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    smoothed_left: Vec<u32>,
    smoothed_right: Vec<u32>,
    left_edges: Vec<EdgeFeature>,
    right_edges: Vec<EdgeFeature>,
    left_x: Vec<usize>,
    right_x: Vec<usize>,
    matches: Vec<Match>,
    features: Vec<StereoFeature>,
    threshold: f32
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for EdgesParams {
    fn default() -> Self {
        Self {
            edge_detection_radius: 5,
            matching: MatchParams {
                threshold_percent: 40,
                ..MatchParams::default()
            }
        }
    }
}

impl Edges {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: EdgesParams) -> Self {
        Self {
            params,
            arena: ScratchArena::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            smoothed_left: Vec::new(),
            smoothed_right: Vec::new(),
            left_edges: Vec::new(),
            right_edges: Vec::new(),
            left_x: Vec::new(),
            right_x: Vec::new(),
            matches: Vec::new(),
            features: Vec::new(),
            threshold: 0.0
        }
    }

    pub fn params(&self) -> &EdgesParams {
        &self.params
    }

    /// Ladder threshold used on the last frame.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl CorrespondenceAlgorithm for Edges {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "edges")?;

        let (w, h) = (frame.width, frame.height);
        if self.arena.prepare(w, h) {
            ensure_len(&mut self.smoothed_left, w);
            ensure_len(&mut self.smoothed_right, w);
        }

        let left = mono::convert(
            frame.left, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_left
        )?;
        let right = mono::convert(
            frame.right, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_right
        )?;

        self.features.clear();
        self.threshold = auto_threshold(left, w, h);

        let radius = self.params.edge_detection_radius;
        let matching = &self.params.matching;
        let max_disp = max_disparity_pixels(w, matching.max_disparity_percent);
        let dx = calib.dx_pixels();
        let dy = calib.dy_pixels();
        let compare_radius = matching.compare_radius;

        for y in 0..h {
            let yr = match shifted_row(y, dy, h) {
                Some(yr) => yr,
                None => continue
            };

            let left_row = &left[y * w..(y + 1) * w];
            let right_row = &right[yr * w..(yr + 1) * w];

            smooth_row(left_row, &mut self.smoothed_left);
            smooth_row(right_row, &mut self.smoothed_right);

            self.left_edges.clear();
            self.right_edges.clear();
            ladder_edges(&self.smoothed_left, y, radius, self.threshold, &mut self.left_edges);
            ladder_edges(&self.smoothed_right, yr, radius, self.threshold, &mut self.right_edges);

            self.left_x.clear();
            self.left_x.extend(self.left_edges.iter().map(|e| e.x));
            self.right_x.clear();
            self.right_x.extend(self.right_edges.iter().map(|e| e.x));

            let left_edges: &[EdgeFeature] = &self.left_edges;
            let right_edges: &[EdgeFeature] = &self.right_edges;

            // Edges are emitted in increasing x, so polarity is found by binary search on the
            // candidate's own list.
            let polarity = |edges: &[EdgeFeature], x: usize| {
                edges
                    .binary_search_by_key(&x, |e| e.x)
                    .ok()
                    .map(|i| edges[i].polarity)
            };

            self.matches.clear();
            absolute_pass(
                y,
                &self.left_x,
                &self.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                |xl, xr| {
                    if polarity(left_edges, xl) != polarity(right_edges, xr) {
                        return INFINITE_SCORE;
                    }
                    window_ssd(left_row, xl, right_row, xr, compare_radius)
                },
                &mut self.matches
            );
            relative_pass(&mut self.matches, matching.threshold_percent);

            self.features.extend(
                self.matches
                    .iter()
                    .map(|m| StereoFeature::new(m.x_left as f32, y as f32, m.disparity as f32))
            );
        }

        log::debug!(
            "edges: {} stereo features, ladder threshold {:.2}",
            self.features.len(), self.threshold
        );

        Ok(())
    }

    fn features(&self) -> &[StereoFeature] {
        &self.features
    }

    fn scratch_generation(&self) -> u64 {
        self.arena.generation()
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_images::*;

    #[test]
    fn shifted_step_gives_disparity() {
        let left = step(64, 48, 30);
        let right = step(64, 48, 25);
        let mut alg = Edges::new(EdgesParams::default());

        alg.update(&StereoFrame::new(&left, &right, 64, 48), Calibration::default()).unwrap();

        assert_eq!(alg.features().len(), 48);
        assert!(alg.features().iter().all(|f| f.x == 29.0 && f.disparity == 5.0));
        assert!(alg.threshold() >= 5.0);
    }

    #[test]
    fn opposite_polarity_is_never_matched() {
        let left = step(64, 16, 30);
        let right: Vec<u8> = step(64, 16, 25).iter().map(|v| 250 - v).collect();
        let mut alg = Edges::new(EdgesParams::default());

        alg.update(&StereoFrame::new(&left, &right, 64, 16), Calibration::default()).unwrap();
        assert!(alg.features().is_empty());
    }

    #[test]
    fn flat_images_give_nothing() {
        let flat = vec![60u8; 64 * 48];
        let mut alg = Edges::new(EdgesParams::default());

        alg.update(&StereoFrame::new(&flat, &flat, 64, 48), Calibration::default()).unwrap();
        assert!(alg.features().is_empty());
    }
}
