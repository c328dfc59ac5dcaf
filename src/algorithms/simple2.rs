//! # Cross-checked row matching
//!
//! As [`Simple`](super::simple::Simple), but each row is searched in both directions and a
//! pairing is only kept if the left feature's best right candidate also chose that left
//! feature as its own best candidate.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{shifted_row, validate, RowScratch};
use crate::disparity::*;
use crate::error::*;
use crate::matcher::*;
use crate::mono::{self, ChannelOrder, MonoMode};
use crate::row_features::RowFeatureParams;
use crate::scratch::ScratchArena;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Simple2Params {
    pub features: RowFeatureParams,
    pub matching: MatchParams,
    pub mono_mode: MonoMode,
    pub channel_order: ChannelOrder
}

pub struct Simple2 {
    params: Simple2Params,
    arena: ScratchArena,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    rows: RowScratch,
    features: Vec<StereoFeature>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Simple2Params {
    fn default() -> Self {
        Self {
            features: RowFeatureParams::default(),
            matching: MatchParams {
                threshold_percent: 60,
                ..MatchParams::default()
            },
            mono_mode: MonoMode::Luminance,
            channel_order: ChannelOrder::Rgb
        }
    }
}

impl Simple2 {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: Simple2Params) -> Self {
        Self {
            rows: RowScratch::new(params.features.clone()),
            params,
            arena: ScratchArena::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            features: Vec::new()
        }
    }

    pub fn params(&self) -> &Simple2Params {
        &self.params
    }
}

impl CorrespondenceAlgorithm for Simple2 {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "simple2")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);

        let (mode, order) = (self.params.mono_mode, self.params.channel_order);
        let left = mono::convert(frame.left, w, h, mode, order, &mut self.mono_left)?;
        let right = mono::convert(frame.right, w, h, mode, order, &mut self.mono_right)?;

        self.features.clear();

        let matching = &self.params.matching;
        let max_disp = max_disparity_pixels(w, matching.max_disparity_percent);
        let dx = calib.dx_pixels();
        let dy = calib.dy_pixels();
        let radius = matching.compare_radius;
        let mut rejected = 0;

        for y in 0..h {
            let yr = match shifted_row(y, dy, h) {
                Some(yr) => yr,
                None => continue
            };

            let left_row = &left[y * w..(y + 1) * w];
            let right_row = &right[yr * w..(yr + 1) * w];
            let score = |xl: usize, xr: usize| window_ssd(left_row, xl, right_row, xr, radius);

            self.rows.extract(left_row, right_row);

            absolute_pass(
                y,
                &self.rows.left_x,
                &self.rows.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                score,
                &mut self.rows.matches
            );
            absolute_pass_right_anchored(
                y,
                &self.rows.left_x,
                &self.rows.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                score,
                &mut self.rows.backward
            );

            let before = self.rows.matches.len();
            cross_check(&mut self.rows.matches, &self.rows.backward);
            rejected += before - self.rows.matches.len();

            relative_pass(&mut self.rows.matches, matching.threshold_percent);

            self.features.extend(
                self.rows.matches
                    .iter()
                    .map(|m| StereoFeature::new(m.x_left as f32, y as f32, m.disparity as f32))
            );
        }

        log::debug!(
            "simple2: {} stereo features, {} failed the cross check",
            self.features.len(), rejected
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
        let mut alg = Simple2::new(Simple2Params::default());

        alg.update(&StereoFrame::new(&left, &right, 64, 48), Calibration::default()).unwrap();

        assert_eq!(alg.features().len(), 48);
        assert!(alg.features().iter().all(|f| f.x == 29.0 && f.disparity == 5.0));
    }

    #[test]
    fn cross_checked_texture_matches_are_consistent() {
        let left = texture(96, 8, 0);
        let right = texture(96, 8, 6);
        let mut alg = Simple2::new(Simple2Params::default());

        alg.update(&StereoFrame::new(&left, &right, 96, 8), Calibration::default()).unwrap();

        let features = alg.features();
        let correct = features.iter().filter(|f| f.disparity == 6.0).count();
        assert!(!features.is_empty());
        assert!(correct * 10 >= features.len() * 9, "{} of {} correct", correct, features.len());
    }

    #[test]
    fn accepts_colour_frames() {
        let left: Vec<u8> = step(64, 8, 30).into_iter().flat_map(|v| vec![v; 3]).collect();
        let right: Vec<u8> = step(64, 8, 25).into_iter().flat_map(|v| vec![v; 3]).collect();
        let mut alg = Simple2::new(Simple2Params::default());

        alg.update(&StereoFrame::new(&left, &right, 64, 8), Calibration::default()).unwrap();
        assert_eq!(alg.features().len(), 8);
    }
}
