//! # Canny edge matching
//!
//! Both images are reduced to mono and compressed vertically by averaging blocks of rows.
//! Canny edges found on the compressed images are thinned to a fixed number per row, stripped
//! of edges without enough surrounding texture, and matched row by row.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{shifted_row, validate};
use crate::disparity::*;
use crate::edges::{thin_row, variance_filter, CannyDetector};
use crate::error::*;
use crate::matcher::*;
use crate::mono::{self, compress_rows, ChannelOrder, MonoMode};
use crate::row_features::RowFeature;
use crate::scratch::ScratchArena;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CannyParams {
    pub low_threshold: f32,
    pub high_threshold: f32,

    /// Number of image rows averaged into each compressed row.
    pub vertical_compression: usize,

    pub max_edges_per_row: usize,

    /// Edges with local variance below `matching_threshold * minimum_variance_percent / 100`
    /// are not matched.
    pub minimum_variance_percent: u64,

    pub matching: MatchParams
}

pub struct Canny {
    params: CannyParams,
    arena: ScratchArena,
    detector: CannyDetector,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    compressed_left: Vec<u8>,
    compressed_right: Vec<u8>,
    left_edges: Vec<RowFeature>,
    right_edges: Vec<RowFeature>,
    left_x: Vec<usize>,
    right_x: Vec<usize>,
    matches: Vec<Match>,
    features: Vec<StereoFeature>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low_threshold: 20.0,
            high_threshold: 60.0,
            vertical_compression: 4,
            max_edges_per_row: 40,
            minimum_variance_percent: 5,
            matching: MatchParams {
                threshold_percent: 50,
                ..MatchParams::default()
            }
        }
    }
}

impl CannyParams {
    /// Local variance below which an edge is too textureless to match.
    pub fn minimum_variance(&self) -> u64 {
        self.matching.matching_threshold * self.minimum_variance_percent / 100
    }
}

impl Canny {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: CannyParams) -> Self {
        Self {
            params,
            arena: ScratchArena::new(),
            detector: CannyDetector::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            compressed_left: Vec::new(),
            compressed_right: Vec::new(),
            left_edges: Vec::new(),
            right_edges: Vec::new(),
            left_x: Vec::new(),
            right_x: Vec::new(),
            matches: Vec::new(),
            features: Vec::new()
        }
    }

    pub fn params(&self) -> &CannyParams {
        &self.params
    }
}

impl CorrespondenceAlgorithm for Canny {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "canny")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);

        let params = &self.params;
        let vc = params.vertical_compression.max(1);

        let left = mono::convert(
            frame.left, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_left
        )?;
        let right = mono::convert(
            frame.right, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_right
        )?;

        let ch = compress_rows(left, w, h, vc, &mut self.compressed_left);
        compress_rows(right, w, h, vc, &mut self.compressed_right);

        let left_map = self.detector.detect(
            &self.compressed_left, w, ch, params.low_threshold, params.high_threshold
        );
        let right_map = self.detector.detect(
            &self.compressed_right, w, ch, params.low_threshold, params.high_threshold
        );

        self.features.clear();

        let matching = &params.matching;
        let max_disp = max_disparity_pixels(w, matching.max_disparity_percent);
        let dx = calib.dx_pixels();
        let dy = (calib.dy / vc as f32).round() as isize;
        let radius = matching.compare_radius;
        let minimum_variance = params.minimum_variance();

        for cy in 0..ch {
            let cyr = match shifted_row(cy, dy, ch) {
                Some(cyr) => cyr,
                None => continue
            };

            let left_row = &self.compressed_left[cy * w..(cy + 1) * w];
            let right_row = &self.compressed_right[cyr * w..(cyr + 1) * w];

            left_map.row_edges(cy, &mut self.left_edges);
            right_map.row_edges(cyr, &mut self.right_edges);

            thin_row(&mut self.left_edges, params.max_edges_per_row);
            thin_row(&mut self.right_edges, params.max_edges_per_row);

            variance_filter(&mut self.left_edges, left_row, radius, minimum_variance);
            variance_filter(&mut self.right_edges, right_row, radius, minimum_variance);

            self.left_x.clear();
            self.left_x.extend(self.left_edges.iter().map(|e| e.x));
            self.right_x.clear();
            self.right_x.extend(self.right_edges.iter().map(|e| e.x));

            // Output rows sit at the centre of their block of image rows
            let y = (cy * vc + vc / 2).min(h - 1);

            self.matches.clear();
            absolute_pass(
                y,
                &self.left_x,
                &self.right_x,
                dx,
                max_disp,
                matching.matching_threshold,
                |xl, xr| window_ssd(left_row, xl, right_row, xr, radius),
                &mut self.matches
            );
            relative_pass(&mut self.matches, matching.threshold_percent);

            self.features.extend(
                self.matches
                    .iter()
                    .map(|m| StereoFeature::new(m.x_left as f32, m.y as f32, m.disparity as f32))
            );
        }

        log::debug!(
            "canny: {} stereo features from {} compressed rows",
            self.features.len(), ch
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
