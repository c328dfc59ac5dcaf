//! # Geometric (corner) matching
//!
//! FAST corners are detected in both images with a threshold that is steered every frame
//! towards `required_fast_features`. Suppressed corners are matched between the images along
//! the calibration shifted row, allowing `row_tolerance` rows of slack, and the left corners
//! are also joined into verified line segments for consumers which want scene structure.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

#[cfg(feature = "statistics")]
use plotters::prelude::*;

use crate::algorithms::validate;
use crate::corners::*;
use crate::disparity::*;
use crate::error::*;
use crate::matcher::*;
use crate::mono::{self, ChannelOrder, MonoMode};
use crate::scratch::ScratchArena;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GeometricParams {
    pub corners: CornerParams,
    pub matching: MatchParams,

    /// Rows either side of the calibration shifted row in which a right corner may lie.
    pub row_tolerance: usize
}

pub struct Geometric {
    params: GeometricParams,
    arena: ScratchArena,
    fast: FastDetector,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    left_corners: Vec<Corner>,
    right_corners: Vec<Corner>,
    lines: Vec<Line>,
    matches: Vec<Match>,
    features: Vec<StereoFeature>,
    last_count: usize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for GeometricParams {
    fn default() -> Self {
        Self {
            corners: CornerParams::default(),
            matching: MatchParams {
                threshold_percent: 60,
                ..MatchParams::default()
            },
            row_tolerance: 1
        }
    }
}

impl Geometric {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: GeometricParams) -> Self {
        Self {
            fast: FastDetector::new(params.corners.initial_fast_threshold),
            params,
            arena: ScratchArena::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            left_corners: Vec::new(),
            right_corners: Vec::new(),
            lines: Vec::new(),
            matches: Vec::new(),
            features: Vec::new(),
            last_count: 0
        }
    }

    pub fn params(&self) -> &GeometricParams {
        &self.params
    }

    /// Line segments found between the left image's corners on the last frame.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Suppressed corners of the left image on the last frame.
    pub fn corners(&self) -> &[Corner] {
        &self.left_corners
    }

    /// FAST threshold that will be used on the next frame.
    pub fn fast_threshold(&self) -> u8 {
        self.fast.threshold()
    }

    /// Raw FAST corner count of the left image on the last frame.
    pub fn fast_count(&self) -> usize {
        self.last_count
    }

    /// Chart the FAST threshold used on each frame so far into a PNG at `path`.
    #[cfg(feature = "statistics")]
    pub fn plot_threshold_history(&self, path: &str) -> Result<()> {
        let history = self.fast.history();

        let area = BitMapBackend::new(path, (800, 600)).into_drawing_area();
        area.fill(&WHITE).map_err(|e| Error::Statistics(e.to_string()))?;

        let mut chart = ChartBuilder::on(&area)
            .caption("FAST threshold", ("sans-serif", 20).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_ranged(0..history.len().max(1), 0u32..256u32)
            .map_err(|e| Error::Statistics(e.to_string()))?;

        chart.configure_mesh().draw().map_err(|e| Error::Statistics(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(
                history.iter().map(|&(frame, t)| (frame, t as u32)),
                &RED
            ))
            .map_err(|e| Error::Statistics(e.to_string()))?;

        log::debug!("Plotted {} FAST thresholds to {}", history.len(), path);

        Ok(())
    }
}

impl CorrespondenceAlgorithm for Geometric {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "geometric")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);

        let left = mono::convert(
            frame.left, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_left
        )?;
        let right = mono::convert(
            frame.right, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_right
        )?;

        let corner_params = &self.params.corners;

        self.last_count = self.fast.detect(left, w, h, &mut self.left_corners);
        self.fast.detect(right, w, h, &mut self.right_corners);
        self.fast.adapt(self.last_count, corner_params.required_fast_features);

        suppress_corners(&mut self.left_corners, corner_params.nms_radius);
        suppress_corners(&mut self.right_corners, corner_params.nms_radius);

        self.lines.clear();
        detect_lines(left, w, h, &self.left_corners, corner_params, &mut self.lines);
        filter_lines(&mut self.lines, corner_params.line_threshold_factor);

        self.features.clear();
        self.matches.clear();

        let matching = &self.params.matching;
        let max_disp = max_disparity_pixels(w, matching.max_disparity_percent);
        let dx = calib.dx_pixels();
        let dy = calib.dy_pixels();
        let tolerance = self.params.row_tolerance as isize;
        let radius = matching.compare_radius;

        for l in &self.left_corners {
            let target = l.y as isize + dy;
            let left_row = &left[l.y * w..(l.y + 1) * w];

            let candidates = self.right_corners
                .iter()
                .filter(|r| (r.y as isize - target).abs() <= tolerance)
                .map(|r| (l.x, r.x, r.y));

            let best = best_candidate(
                l.y,
                candidates,
                dx,
                max_disp,
                matching.matching_threshold,
                |xl, xr, yr| window_ssd(left_row, xl, &right[yr * w..(yr + 1) * w], xr, radius)
            );

            if let Some(m) = best {
                self.matches.push(m);
            }
        }

        relative_pass(&mut self.matches, matching.threshold_percent);

        self.features.extend(
            self.matches
                .iter()
                .map(|m| StereoFeature::new(m.x_left as f32, m.y as f32, m.disparity as f32))
        );

        log::debug!(
            "geometric: {} corners, {} lines, {} stereo features",
            self.left_corners.len(), self.lines.len(), self.features.len()
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

    /// A 4x4 grid of 10 pixel squares of increasing brightness on a dark background, shifted
    /// `shift` pixels to the left.
    fn squares(width: usize, height: usize, shift: usize) -> Vec<u8> {
        let mut img = vec![20u8; width * height];

        for k in 0..16 {
            let (x0, y0) = (20 + 35 * (k % 4), 12 + 26 * (k / 4));
            let value = 40 + 12 * k as u8;

            for y in y0..y0 + 10 {
                for x in x0..x0 + 10 {
                    if x >= shift && x - shift < width && y < height {
                        img[y * width + x - shift] = value;
                    }
                }
            }
        }

        img
    }

    #[test]
    fn shifted_squares_match() {
        let left = squares(160, 120, 0);
        let right = squares(160, 120, 5);
        let mut alg = Geometric::new(GeometricParams::default());

        alg.update(&StereoFrame::new(&left, &right, 160, 120), Calibration::default()).unwrap();

        let features = alg.features();
        assert!(!features.is_empty());
        assert!(features.iter().all(|f| f.disparity == 5.0));
        assert!(features.iter().all(|f| f.x < 160.0 && f.y < 120.0));
    }

    #[test]
    fn corners_match_within_row_tolerance() {
        let (w, h) = (160, 120);
        let left = squares(w, h, 0);

        // Right image one row lower as well as five pixels left
        let mut right = vec![20u8; w];
        right.extend_from_slice(&squares(w, h, 5)[..(h - 1) * w]);

        let mut alg = Geometric::new(GeometricParams::default());
        alg.update(&StereoFrame::new(&left, &right, w, h), Calibration::default()).unwrap();

        let features = alg.features();
        assert!(!features.is_empty());
        assert!(features.iter().all(|f| f.disparity == 5.0));
    }

    #[test]
    fn fast_threshold_converges() {
        let img = squares(160, 120, 0);
        let params = GeometricParams {
            corners: CornerParams {
                required_fast_features: 100,
                ..CornerParams::default()
            },
            ..GeometricParams::default()
        };
        let mut alg = Geometric::new(params);

        let mut thresholds = Vec::new();
        for _ in 0..300 {
            alg.update(&StereoFrame::new(&img, &img, 160, 120), Calibration::default()).unwrap();
            thresholds.push(alg.fast_threshold());
        }

        let n = thresholds.len();
        assert_eq!(thresholds[n - 1], thresholds[n - 2]);
        assert!((alg.fast_count() as isize - 100).abs() <= 100);
    }

    #[test]
    fn flat_images_give_nothing() {
        let flat = vec![20u8; 160 * 120];
        let mut alg = Geometric::new(GeometricParams::default());

        alg.update(&StereoFrame::new(&flat, &flat, 160, 120), Calibration::default()).unwrap();

        assert!(alg.features().is_empty());
        assert!(alg.lines().is_empty());
        assert!(alg.fast_threshold() < 20);
    }
}
