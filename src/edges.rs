//! # Edge detection
//!
//! Two edge strategies used by different algorithms:
//!
//! - Canny edges on a vertically compressed image, computed by `imageproc`, then thinned per
//!   row and filtered by local texture.
//! - A threshold ladder over a horizontally smoothed row, where an edge must show a consistent
//!   asymmetry at every radius from `edge_detection_radius` down to 2.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{edges::canny, gradients::sobel_gradients};

use crate::row_features::RowFeature;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Half width of the smoothing window used by the threshold ladder (7 taps).
const SMOOTHING_RADIUS: usize = 3;

/// Samples per axis of the grid used to estimate global contrast.
const CONTRAST_GRID: usize = 32;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Direction of the intensity change across an edge, read left to right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Rising,
    Falling
}

/// An edge found by the threshold ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeFeature {
    pub x: usize,
    pub y: usize,
    pub polarity: Polarity,
    pub magnitude: u64
}

/// Wrapper around the external Canny detector, owning the input image it is fed from.
pub struct CannyDetector {
    gray: GrayImage
}

/// Binary edge map and gradient magnitudes produced by [`CannyDetector::detect`].
pub struct CannyEdgeMap {
    edges: GrayImage,
    magnitude: ImageBuffer<Luma<u16>, Vec<u16>>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CannyDetector {
    pub fn new() -> Self {
        Self {
            gray: GrayImage::new(0, 0)
        }
    }

    /// Run Canny edge detection over a mono buffer.
    pub fn detect(
        &mut self,
        mono: &[u8],
        width: usize,
        height: usize,
        low_threshold: f32,
        high_threshold: f32
    ) -> CannyEdgeMap {
        if self.gray.dimensions() != (width as u32, height as u32) {
            self.gray = GrayImage::new(width as u32, height as u32);
        }

        let dst: &mut [u8] = &mut self.gray;
        dst.copy_from_slice(&mono[..width * height]);

        CannyEdgeMap {
            edges: canny(&self.gray, low_threshold, high_threshold),
            magnitude: sobel_gradients(&self.gray)
        }
    }
}

impl Default for CannyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CannyEdgeMap {
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.edges.get_pixel(x as u32, y as u32)[0] > 0
    }

    pub fn magnitude(&self, x: usize, y: usize) -> u16 {
        self.magnitude.get_pixel(x as u32, y as u32)[0]
    }

    /// Collect the edges on row `y`, in increasing `x`, into `out`.
    pub fn row_edges(&self, y: usize, out: &mut Vec<RowFeature>) {
        out.clear();

        for x in 0..self.edges.width() as usize {
            if self.is_edge(x, y) {
                out.push(RowFeature { x, magnitude: self.magnitude(x, y) as u64 });
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Discard the weakest edge on the row until at most `max_edges` remain.
pub fn thin_row(edges: &mut Vec<RowFeature>, max_edges: usize) {
    while edges.len() > max_edges {
        let weakest = edges
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.magnitude)
            .map(|(i, _)| i);

        match weakest {
            Some(i) => { edges.remove(i); },
            None => break
        }
    }
}

/// Texture around `x`: the sum of squared three-point symmetric differences
/// `(I[i + 1] - I[i - 1])²` for `i` within `radius` of `x`.
///
/// `None` if the stencil leaves the row.
pub fn local_variance(row: &[u8], x: usize, radius: usize) -> Option<u64> {
    if x < radius + 1 || x + radius + 1 >= row.len() {
        return None;
    }

    Some(
        ((x - radius)..=(x + radius))
            .map(|i| {
                let d = row[i + 1] as i64 - row[i - 1] as i64;
                (d * d) as u64
            })
            .sum()
    )
}

/// Drop edges whose local variance falls below `minimum_variance`.
pub fn variance_filter(edges: &mut Vec<RowFeature>, row: &[u8], radius: usize, minimum_variance: u64) {
    edges.retain(|e| {
        local_variance(row, e.x, radius).map_or(false, |v| v >= minimum_variance)
    });
}

/// Threshold used by the ladder, derived from the global contrast of the image.
///
/// Contrast is the mean absolute deviation of a coarse sample grid over the central half of
/// the frame, as a fraction of full scale.
pub fn auto_threshold(mono: &[u8], width: usize, height: usize) -> f32 {
    let step_x = (width / CONTRAST_GRID).max(1);
    let step_y = (height / CONTRAST_GRID).max(1);

    let samples: Vec<f32> = (height / 4..height * 3 / 4)
        .step_by(step_y)
        .flat_map(|y| {
            (width / 4..width * 3 / 4)
                .step_by(step_x)
                .map(move |x| mono[y * width + x] as f32)
        })
        .collect();

    if samples.is_empty() {
        return 5.0;
    }

    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let deviation = samples.iter().map(|s| (s - mean).abs()).sum::<f32>() / samples.len() as f32;
    let contrast = deviation / 255.0;

    5.0 + contrast * 120.0 / 20.0
}

/// 7-tap horizontal running sum. Positions whose window leaves the row are zero.
pub fn smooth_row(row: &[u8], out: &mut [u32]) {
    let w = row.len();
    out.iter_mut().for_each(|v| *v = 0);

    if w < 2 * SMOOTHING_RADIUS + 1 {
        return;
    }

    let mut acc: u32 = row[..=2 * SMOOTHING_RADIUS].iter().map(|&v| v as u32).sum();
    out[SMOOTHING_RADIUS] = acc;

    for x in (SMOOTHING_RADIUS + 1)..(w - SMOOTHING_RADIUS) {
        acc += row[x + SMOOTHING_RADIUS] as u32;
        acc -= row[x - SMOOTHING_RADIUS - 1] as u32;
        out[x] = acc;
    }
}

/// Find ladder edges on a smoothed row, appending them to `out`.
///
/// A pixel is an edge if, for every radius `r` from `radius` down to 2, the difference
/// `s[x + r] - s[x - r]` exceeds `threshold * r` in magnitude with the same sign. Runs of
/// consecutive edge pixels with the same polarity collapse to one edge at their midpoint whose
/// magnitude is the accumulated outermost difference.
pub fn ladder_edges(
    smoothed: &[u32],
    y: usize,
    radius: usize,
    threshold: f32,
    out: &mut Vec<EdgeFeature>
) {
    let radius = radius.max(2);
    let w = smoothed.len();
    let margin = radius + SMOOTHING_RADIUS;

    if w <= 2 * margin {
        return;
    }

    // (start, end, polarity, magnitude) of the run being accumulated
    let mut run: Option<(usize, usize, Polarity, u64)> = None;

    for x in margin..(w - margin) {
        let edge = ladder_test(smoothed, x, radius, threshold);

        run = match (run, edge) {
            (Some((start, end, pol, mag)), Some((p, m))) if p == pol && end + 1 == x => {
                Some((start, x, pol, mag + m))
            },
            (prev, next) => {
                if let Some((start, end, polarity, magnitude)) = prev {
                    out.push(EdgeFeature { x: (start + end) / 2, y, polarity, magnitude });
                }
                next.map(|(p, m)| (x, x, p, m))
            }
        };
    }

    if let Some((start, end, polarity, magnitude)) = run {
        out.push(EdgeFeature { x: (start + end) / 2, y, polarity, magnitude });
    }
}

fn ladder_test(smoothed: &[u32], x: usize, radius: usize, threshold: f32) -> Option<(Polarity, u64)> {
    let mut polarity = None;
    let mut magnitude = 0;

    for r in (2..=radius).rev() {
        let diff = smoothed[x + r] as i64 - smoothed[x - r] as i64;

        if (diff.abs() as f32) <= threshold * r as f32 {
            return None;
        }

        let p = if diff > 0 { Polarity::Rising } else { Polarity::Falling };
        match polarity {
            None => {
                polarity = Some(p);
                magnitude = diff.abs() as u64;
            },
            Some(q) if q != p => return None,
            _ => ()
        }
    }

    polarity.map(|p| (p, magnitude))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
