//! # Colour row matching
//!
//! Row features are taken from luminance, and candidate pairings are scored by a blend of the
//! luminance SSD and the SSD of a hue channel, with hue differences taken round the colour circle. Requires three channel frames.

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
pub struct ColourParams {
    pub features: RowFeatureParams,
    pub matching: MatchParams,
    pub channel_order: ChannelOrder
}

pub struct SimpleColour {
    params: ColourParams,
    arena: ScratchArena,
    luma_left: Vec<u8>,
    luma_right: Vec<u8>,
    hue_left: Vec<u8>,
    hue_right: Vec<u8>,
    rows: RowScratch,
    features: Vec<StereoFeature>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for ColourParams {
    fn default() -> Self {
        Self {
            features: RowFeatureParams::default(),
            matching: MatchParams {
                threshold_percent: 70,
                ..MatchParams::default()
            },
            channel_order: ChannelOrder::Rgb
        }
    }
}

impl SimpleColour {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: ColourParams) -> Self {
        Self {
            rows: RowScratch::new(params.features.clone()),
            params,
            arena: ScratchArena::new(),
            luma_left: Vec::new(),
            luma_right: Vec::new(),
            hue_left: Vec::new(),
            hue_right: Vec::new(),
            features: Vec::new()
        }
    }

    pub fn params(&self) -> &ColourParams {
        &self.params
    }
}

impl CorrespondenceAlgorithm for SimpleColour {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, Some(3), "simple_colour")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);

        let order = self.params.channel_order;
        let left = mono::convert(frame.left, w, h, MonoMode::Luminance, order, &mut self.luma_left)?;
        let right = mono::convert(frame.right, w, h, MonoMode::Luminance, order, &mut self.luma_right)?;
        let left_hue = mono::convert(frame.left, w, h, MonoMode::Hue, order, &mut self.hue_left)?;
        let right_hue = mono::convert(frame.right, w, h, MonoMode::Hue, order, &mut self.hue_right)?;

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

            let (l0, l1) = (y * w, (y + 1) * w);
            let (r0, r1) = (yr * w, (yr + 1) * w);
            let (left_row, right_row) = (&left[l0..l1], &right[r0..r1]);
            let (left_hue_row, right_hue_row) = (&left_hue[l0..l1], &right_hue[r0..r1]);

            self.rows.extract(left_row, right_row);

            absolute_pass(
                y,
                &self.rows.left_x,
                &self.rows.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                |xl, xr| blend_scores(
                    window_ssd(left_row, xl, right_row, xr, radius),
                    circular_window_ssd(left_hue_row, xl, right_hue_row, xr, radius)
                ),
                &mut self.rows.matches
            );
            relative_pass(&mut self.rows.matches, matching.threshold_percent);

            self.features.extend(self.rows.matches.iter().map(|m| {
                let n = (y * w + m.x_left) * 3;
                let px = &frame.left[n..n + 3];
                let colour = match order {
                    ChannelOrder::Rgb => [px[0], px[1], px[2]],
                    ChannelOrder::Bgr => [px[2], px[1], px[0]]
                };

                StereoFeature {
                    colour: Some(colour),
                    ..StereoFeature::new(m.x_left as f32, y as f32, m.disparity as f32)
                }
            }));
        }

        log::debug!("simple_colour: {} stereo features", self.features.len());

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
