//! # Corners and lines
//!
//! FAST corners (from `imageproc`) with a threshold that adapts every frame towards a target
//! corner count, non-maximal suppression over the detected corners, and straight line
//! segments between corner pairs verified against the image intensities.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::cmp::Ordering;

use image::GrayImage;
use imageproc::corners::corners_fast9;
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub x: usize,
    pub y: usize,
    pub response: f32
}

/// A segment between two corners which passed the line consistency test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub a: Corner,
    pub b: Corner,
    pub response: f32
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CornerParams {
    /// Corner count the FAST threshold is steered towards.
    pub required_fast_features: usize,

    /// FAST threshold used on the first frame.
    pub initial_fast_threshold: u8,

    /// Corners closer than this (in either axis) to a stronger corner are suppressed.
    pub nms_radius: usize,

    /// Minimum line length as a percentage of the image width.
    pub minimum_line_length: f32,

    /// Only the strongest corners take part in line fitting.
    pub max_line_corners: usize,

    /// Perpendicular distance of the intensity samples either side of a line.
    pub line_sample_offset: usize,

    /// Percentage of samples which must agree on which side of the line is brighter.
    pub line_consistency_percent: f32,

    /// Minimum mean intensity difference across an accepted line.
    pub minimum_line_contrast: f32,

    /// Lines below this multiple of the mean accepted response are discarded.
    pub line_threshold_factor: f32
}

/// FAST detector with its adaptive threshold.
pub struct FastDetector {
    gray: GrayImage,
    threshold: u8,

    #[cfg(feature = "statistics")]
    history: Vec<(usize, u8)>
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Next FAST threshold given the number of corners found with the current one.
pub fn adapt_threshold(threshold: u8, count: usize, required: usize) -> u8 {
    if count < required / 2 {
        threshold.saturating_sub(1).max(1)
    }
    else if count > required {
        threshold.saturating_add(1)
    }
    else {
        threshold
    }
}

/// Keep only corners with no stronger corner within `radius` pixels in either axis.
pub fn suppress_corners(corners: &mut Vec<Corner>, radius: usize) {
    corners.sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));

    let mut kept: Vec<Corner> = Vec::with_capacity(corners.len());
    for c in corners.iter() {
        let dominated = kept.iter().any(|k| {
            (k.x as isize - c.x as isize).abs() as usize <= radius
                && (k.y as isize - c.y as isize).abs() as usize <= radius
        });

        if !dominated {
            kept.push(*c);
        }
    }

    *corners = kept;
}

/// Intensity consistency of the straight segment between two corners.
///
/// Pixels are sampled `offset` pixels either side of each point along the segment (endpoints
/// excluded). The segment is a line if at least `consistency_percent` of the samples agree on
/// which side is brighter and the mean difference reaches `minimum_contrast`. The response is
/// that mean difference.
pub fn line_response(
    mono: &[u8],
    width: usize,
    height: usize,
    a: &Corner,
    b: &Corner,
    offset: usize,
    consistency_percent: f32,
    minimum_contrast: f32
) -> Option<f32> {
    let dx = b.x as f32 - a.x as f32;
    let dy = b.y as f32 - a.y as f32;
    let length = (dx * dx + dy * dy).sqrt();

    if length < 1.0 {
        return None;
    }

    // Unit normal to the segment
    let (nx, ny) = (-dy / length, dx / length);
    let off = offset.max(1) as f32;
    let steps = dx.abs().max(dy.abs()) as usize;

    let at = |x: f32, y: f32| -> Option<i32> {
        let (xi, yi) = (x.round(), y.round());
        if xi < 0.0 || yi < 0.0 || xi as usize >= width || yi as usize >= height {
            None
        }
        else {
            Some(mono[yi as usize * width + xi as usize] as i32)
        }
    };

    let mut positive = 0usize;
    let mut negative = 0usize;
    let mut total = 0i64;
    let mut samples = 0usize;

    for i in 1..steps {
        let t = i as f32 / steps as f32;
        let px = a.x as f32 + dx * t;
        let py = a.y as f32 + dy * t;

        let (s1, s2) = match (at(px + nx * off, py + ny * off), at(px - nx * off, py - ny * off)) {
            (Some(s1), Some(s2)) => (s1, s2),
            _ => return None
        };

        let diff = s1 - s2;
        if diff > 0 {
            positive += 1;
        }
        else if diff < 0 {
            negative += 1;
        }
        total += diff as i64;
        samples += 1;
    }

    if samples == 0 {
        return None;
    }

    let agreement = positive.max(negative) as f32 * 100.0 / samples as f32;
    let contrast = (total.abs() as f32) / samples as f32;

    if agreement >= consistency_percent && contrast >= minimum_contrast {
        Some(contrast)
    }
    else {
        None
    }
}

/// Test every pair of the strongest corners for a line, appending accepted lines to `out`.
pub fn detect_lines(
    mono: &[u8],
    width: usize,
    height: usize,
    corners: &[Corner],
    params: &CornerParams,
    out: &mut Vec<Line>
) {
    let min_length = width as f32 * params.minimum_line_length / 100.0;
    let candidates = &corners[..corners.len().min(params.max_line_corners)];

    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            let dx = b.x as f32 - a.x as f32;
            let dy = b.y as f32 - a.y as f32;

            if (dx * dx + dy * dy).sqrt() <= min_length {
                continue;
            }

            if let Some(response) = line_response(
                mono, width, height, a, b,
                params.line_sample_offset,
                params.line_consistency_percent,
                params.minimum_line_contrast
            ) {
                out.push(Line { a: *a, b: *b, response });
            }
        }
    }
}

/// Discard lines whose response is below `factor` times the mean response.
///
/// Does nothing if there are no lines.
pub fn filter_lines(lines: &mut Vec<Line>, factor: f32) {
    if lines.is_empty() {
        return;
    }

    let mean = lines.iter().map(|l| l.response).sum::<f32>() / lines.len() as f32;
    let cutoff = mean * factor;
    lines.retain(|l| l.response >= cutoff);
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            required_fast_features: 200,
            initial_fast_threshold: 20,
            nms_radius: 3,
            minimum_line_length: 10.0,
            max_line_corners: 60,
            line_sample_offset: 2,
            line_consistency_percent: 90.0,
            minimum_line_contrast: 20.0,
            line_threshold_factor: 1.5
        }
    }
}

impl FastDetector {
    pub fn new(initial_threshold: u8) -> Self {
        Self {
            gray: GrayImage::new(0, 0),
            threshold: initial_threshold.max(1),

            #[cfg(feature = "statistics")]
            history: Vec::new()
        }
    }

    /// Threshold which will be used for the next frame.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Detect corners with the current threshold into `out`, returning how many were found.
    pub fn detect(&mut self, mono: &[u8], width: usize, height: usize, out: &mut Vec<Corner>) -> usize {
        if self.gray.dimensions() != (width as u32, height as u32) {
            self.gray = GrayImage::new(width as u32, height as u32);
        }

        let dst: &mut [u8] = &mut self.gray;
        dst.copy_from_slice(&mono[..width * height]);

        out.clear();
        out.extend(
            corners_fast9(&self.gray, self.threshold)
                .into_iter()
                .map(|c| Corner { x: c.x as usize, y: c.y as usize, response: c.score })
        );

        out.len()
    }

    /// Steer the threshold for the next frame given this frame's corner count.
    pub fn adapt(&mut self, count: usize, required: usize) {
        #[cfg(feature = "statistics")]
        self.history.push((self.history.len(), self.threshold));

        let next = adapt_threshold(self.threshold, count, required);
        log::debug!("FAST found {} corners at threshold {}, next {}", count, self.threshold, next);
        self.threshold = next;
    }

    /// Threshold used on each frame so far, indexed by frame.
    #[cfg(feature = "statistics")]
    pub fn history(&self) -> &[(usize, u8)] {
        &self.history
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
