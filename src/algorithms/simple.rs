//! # Simple row matching
//!
//! Row features are extracted from the intensity of every scanline of both images and matched
//! along the (calibration shifted) corresponding row by window SSD.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{shifted_row, validate, RowScratch};
use crate::disparity::*;
use crate::error::*;
use crate::matcher::{absolute_pass, relative_pass, window_ssd, MatchParams};
use crate::mono::{self, ChannelOrder, MonoMode};
use crate::row_features::RowFeatureParams;
use crate::scratch::ScratchArena;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SimpleParams {
    pub features: RowFeatureParams,
    pub matching: MatchParams
}

pub struct Simple {
    params: SimpleParams,
    arena: ScratchArena,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    rows: RowScratch,
    features: Vec<StereoFeature>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Simple {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: SimpleParams) -> Self {
        Self {
            rows: RowScratch::new(params.features.clone()),
            params,
            arena: ScratchArena::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            features: Vec::new()
        }
    }

    pub fn params(&self) -> &SimpleParams {
        &self.params
    }
}

impl CorrespondenceAlgorithm for Simple {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "simple")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);

        let left = mono::convert(
            frame.left, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_left
        )?;
        let right = mono::convert(
            frame.right, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_right
        )?;

        self.features.clear();

        let matching = &self.params.matching;
        let max_disp = max_disparity_pixels(w, matching.max_disparity_percent);
        let dx = calib.dx_pixels();
        let dy = calib.dy_pixels();
        let radius = matching.compare_radius;

        for y in 0..h {
            let yr = match shifted_row(y, dy, h) {
                Some(yr) => yr,
                None => continue
            };

            let left_row = &left[y * w..(y + 1) * w];
            let right_row = &right[yr * w..(yr + 1) * w];

            self.rows.extract(left_row, right_row);

            absolute_pass(
                y,
                &self.rows.left_x,
                &self.rows.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                |xl, xr| window_ssd(left_row, xl, right_row, xr, radius),
                &mut self.rows.matches
            );
            relative_pass(&mut self.rows.matches, matching.threshold_percent);

            self.features.extend(
                self.rows.matches
                    .iter()
                    .map(|m| StereoFeature::new(m.x_left as f32, y as f32, m.disparity as f32))
            );
        }

        log::debug!("simple: {} stereo features", self.features.len());

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
