//! # Row features
//!
//! Per-scanline local contrast features. Each pixel's response is the sum of squared
//! intensity differences between it and the `summation_radius` pixels to its right; local
//! maxima of that response, thinned by non-maximal suppression, are the row's features.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::scratch::ensure_len;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A local contrast maximum on one scanline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowFeature {
    pub x: usize,
    pub magnitude: u64
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RowFeatureParams {
    /// Number of pixels to the right of each pixel included in its response.
    pub summation_radius: usize,

    /// Surviving features are always more than this many pixels apart.
    pub inhibition_radius: usize,

    /// Responses below this are never features.
    pub minimum_response: u64
}

/// Row feature extractor owning its response buffer.
pub struct RowFeatureExtractor {
    pub params: RowFeatureParams,
    response: Vec<u64>
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Compute the contrast response of a row into `response`.
///
/// Uses running sums of the following intensities and their squares, expanding
/// `Σ (I[x] - I[x+k])²` as `R·I[x]² - 2·I[x]·ΣI + ΣI²`, so each pixel costs O(1).
/// Pixels within `border` of either end are left at zero.
pub fn row_response(row: &[u8], summation_radius: usize, border: usize, response: &mut [u64]) {
    let w = row.len();
    let r = summation_radius.max(1);
    let border = border.max(r);

    response.iter_mut().for_each(|v| *v = 0);

    if w <= 2 * border + 1 {
        return;
    }

    // Running sums over row[x + 1 ..= x + r], starting at x = border
    let mut s1: i64 = 0;
    let mut s2: i64 = 0;
    for k in 1..=r {
        let v = row[border + k] as i64;
        s1 += v;
        s2 += v * v;
    }

    for x in border..(w - border) {
        let c = row[x] as i64;
        let acc = r as i64 * c * c - 2 * c * s1 + s2;
        response[x] = acc.max(0) as u64;

        // Slide the window one pixel right
        if x + r + 1 < w {
            let incoming = row[x + r + 1] as i64;
            let outgoing = row[x + 1] as i64;
            s1 += incoming - outgoing;
            s2 += incoming * incoming - outgoing * outgoing;
        }
    }
}

/// Non-maximal suppression of a response row, scanned right to left.
///
/// Responses below `minimum_response` are zeroed. A response within `inhibition_radius` of a
/// stronger survivor is zeroed, otherwise it replaces the weaker survivor it inhibits. The
/// surviving responses are written to `features` in increasing `x`.
pub fn suppress(
    response: &mut [u64],
    inhibition_radius: usize,
    minimum_response: u64,
    features: &mut Vec<RowFeature>
) {
    features.clear();

    let mut last: Option<usize> = None;

    for x in (0..response.len()).rev() {
        let r = response[x];

        if r == 0 || r < minimum_response {
            response[x] = 0;
            continue;
        }

        match last {
            Some(l) if l - x <= inhibition_radius => {
                if r > response[l] {
                    response[l] = 0;
                    last = Some(x);
                }
                else {
                    response[x] = 0;
                }
            },
            _ => last = Some(x)
        }
    }

    features.extend(
        response
            .iter()
            .enumerate()
            .filter(|(_, &r)| r > 0)
            .map(|(x, &magnitude)| RowFeature { x, magnitude })
    );
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for RowFeatureParams {
    fn default() -> Self {
        Self {
            summation_radius: 3,
            inhibition_radius: 4,
            minimum_response: 2000
        }
    }
}

impl RowFeatureExtractor {
    pub fn new(params: RowFeatureParams) -> Self {
        Self {
            params,
            response: Vec::new()
        }
    }

    /// Pixels excluded at each end of a row.
    pub fn border(&self) -> usize {
        self.params.summation_radius.max(self.params.inhibition_radius).max(1)
    }

    /// Extract the features of one row into `features`.
    pub fn extract(&mut self, row: &[u8], features: &mut Vec<RowFeature>) {
        ensure_len(&mut self.response, row.len());

        let border = self.border();
        row_response(row, self.params.summation_radius, border, &mut self.response);
        suppress(
            &mut self.response,
            self.params.inhibition_radius,
            self.params.minimum_response,
            features
        );
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_row(width: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..width)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    fn step_row(width: usize, edge: usize) -> Vec<u8> {
        (0..width).map(|x| if x < edge { 50 } else { 200 }).collect()
    }

    #[test]
    fn running_sum_matches_direct_sum() {
        let row = textured_row(80, 7);
        let mut response = vec![0u64; row.len()];
        row_response(&row, 4, 5, &mut response);

        for x in 5..(row.len() - 5) {
            let direct: u64 = (1..=4)
                .map(|k| {
                    let d = row[x] as i64 - row[x + k] as i64;
                    (d * d) as u64
                })
                .sum();
            assert_eq!(response[x], direct, "mismatch at {}", x);
        }

        assert!(response[..5].iter().all(|&v| v == 0));
        assert!(response[row.len() - 5..].iter().all(|&v| v == 0));
    }

    #[test]
    fn flat_row_has_no_features() {
        let mut ex = RowFeatureExtractor::new(RowFeatureParams::default());
        let mut features = Vec::new();

        ex.extract(&vec![128u8; 64], &mut features);
        assert!(features.is_empty());
    }

    #[test]
    fn step_peaks_on_last_dark_pixel() {
        let mut ex = RowFeatureExtractor::new(RowFeatureParams::default());
        let mut features = Vec::new();

        ex.extract(&step_row(64, 30), &mut features);

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].x, 29);
        assert_eq!(features[0].magnitude, 3 * 150 * 150);
    }

    #[test]
    fn extraction_is_idempotent() {
        let row = textured_row(120, 3);
        let mut ex = RowFeatureExtractor::new(RowFeatureParams {
            minimum_response: 100,
            ..RowFeatureParams::default()
        });

        let mut first = Vec::new();
        let mut second = Vec::new();
        ex.extract(&row, &mut first);
        ex.extract(&row, &mut second);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn survivors_are_separated() {
        for seed in 0..10 {
            let row = textured_row(200, seed);
            let params = RowFeatureParams {
                summation_radius: 2,
                inhibition_radius: 5,
                minimum_response: 10
            };
            let mut ex = RowFeatureExtractor::new(params);
            let mut features = Vec::new();
            ex.extract(&row, &mut features);

            for pair in features.windows(2) {
                assert!(pair[1].x - pair[0].x > 5, "{:?} too close", pair);
            }
        }
    }

    #[test]
    fn suppression_prefers_stronger_left_neighbour() {
        let mut response = vec![0, 0, 9, 0, 5, 0, 0, 0, 0, 7, 0];
        let mut features = Vec::new();

        suppress(&mut response, 2, 1, &mut features);

        assert_eq!(
            features,
            vec![RowFeature { x: 2, magnitude: 9 }, RowFeature { x: 9, magnitude: 7 }]
        );
    }
}
