//! # Matcher
//!
//! Bounded disparity search shared by all the sparse algorithms. Matching happens in two
//! separate passes over the candidate list:
//!
//! 1. [`absolute_pass`] keeps, for each anchor feature, the lowest-scoring candidate within the
//!    disparity range, provided its score is below `matching_threshold`.
//! 2. [`relative_pass`] drops every match scoring above `mean * threshold_percent / 100` of the
//!    matches that survived the first pass.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Dissimilarity returned for comparisons which cannot be made. Never accepted as a match.
pub const INFINITE_SCORE: u64 = u64::MAX;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A candidate left/right pairing, located on left image row `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub y: usize,
    pub x_left: usize,
    pub x_right: usize,
    pub disparity: usize,
    pub score: u64
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchParams {
    /// Maximum disparity as a percentage of the image width.
    pub max_disparity_percent: usize,

    /// Half width of the comparison window.
    pub compare_radius: usize,

    /// Absolute cutoff on the window SSD.
    pub matching_threshold: u64,

    /// Relative cutoff as a percentage of the mean accepted score.
    pub threshold_percent: u64
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Disparity between a left and right column after calibration, if it lies in
/// `0..max_disparity`.
pub fn candidate_disparity(
    x_left: usize,
    x_right: usize,
    dx: isize,
    max_disparity: usize
) -> Option<usize> {
    let d = x_left as isize - x_right as isize + dx;

    if d >= 0 && (d as usize) < max_disparity {
        Some(d as usize)
    }
    else {
        None
    }
}

/// Sum of squared differences between the windows `a[xa - r ..= xa + r]` and
/// `b[xb - r ..= xb + r]`.
///
/// Returns [`INFINITE_SCORE`] if either window leaves its row.
pub fn window_ssd(a: &[u8], xa: usize, b: &[u8], xb: usize, radius: usize) -> u64 {
    if xa < radius || xb < radius || xa + radius >= a.len() || xb + radius >= b.len() {
        return INFINITE_SCORE;
    }

    a[xa - radius..=xa + radius]
        .iter()
        .zip(&b[xb - radius..=xb + radius])
        .fold(0u64, |acc, (&p, &q)| {
            let d = p as i64 - q as i64;
            acc.saturating_add((d * d) as u64)
        })
}

/// As [`window_ssd`] for a circular channel such as hue, where 0 and 255 are neighbours.
///
/// Each difference is taken the short way round, so it never exceeds 128.
pub fn circular_window_ssd(a: &[u8], xa: usize, b: &[u8], xb: usize, radius: usize) -> u64 {
    if xa < radius || xb < radius || xa + radius >= a.len() || xb + radius >= b.len() {
        return INFINITE_SCORE;
    }

    a[xa - radius..=xa + radius]
        .iter()
        .zip(&b[xb - radius..=xb + radius])
        .fold(0u64, |acc, (&p, &q)| {
            let d = (p as i64 - q as i64).abs();
            let d = d.min(256 - d);
            acc.saturating_add((d * d) as u64)
        })
}

/// Blend an intensity score with a colour score as `(3 * intensity + colour) / 4`.
pub fn blend_scores(intensity: u64, colour: u64) -> u64 {
    if intensity == INFINITE_SCORE || colour == INFINITE_SCORE {
        return INFINITE_SCORE;
    }

    intensity
        .saturating_mul(3)
        .saturating_add(colour)
        / 4
}

/// Lowest-scoring candidate on left row `y` whose disparity lies in `0..max_disparity` and
/// whose score is below `matching_threshold`.
///
/// Each candidate is `(x_left, x_right, context)`, where `context` is handed to `score`
/// untouched. `score` may return [`INFINITE_SCORE`] to veto a pairing. Ties keep the first.
pub fn best_candidate<C, I, F>(
    y: usize,
    candidates: I,
    dx: isize,
    max_disparity: usize,
    matching_threshold: u64,
    mut score: F
) -> Option<Match>
where
    I: IntoIterator<Item = (usize, usize, C)>,
    F: FnMut(usize, usize, C) -> u64
{
    let mut best: Option<Match> = None;

    for (xl, xr, context) in candidates {
        let d = match candidate_disparity(xl, xr, dx, max_disparity) {
            Some(d) => d,
            None => continue
        };

        let s = score(xl, xr, context);
        if s >= matching_threshold || s == INFINITE_SCORE {
            continue;
        }

        if best.map_or(true, |b| s < b.score) {
            best = Some(Match { y, x_left: xl, x_right: xr, disparity: d, score: s });
        }
    }

    best
}

/// Best right candidate for every left feature on row `y`, appended to `out`.
///
/// `score(x_left, x_right)` may return [`INFINITE_SCORE`] to veto a pairing.
pub fn absolute_pass<F>(
    y: usize,
    left: &[usize],
    right: &[usize],
    dx: isize,
    max_disparity: usize,
    matching_threshold: u64,
    mut score: F,
    out: &mut Vec<Match>
)
where
    F: FnMut(usize, usize) -> u64
{
    out.extend(left.iter().filter_map(|&xl| {
        best_candidate(
            y,
            right.iter().map(|&xr| (xl, xr, ())),
            dx,
            max_disparity,
            matching_threshold,
            |l, r, _| score(l, r)
        )
    }));
}

/// As [`absolute_pass`] but anchored on the right features, keeping the best left candidate
/// for each.
pub fn absolute_pass_right_anchored<F>(
    y: usize,
    left: &[usize],
    right: &[usize],
    dx: isize,
    max_disparity: usize,
    matching_threshold: u64,
    mut score: F,
    out: &mut Vec<Match>
)
where
    F: FnMut(usize, usize) -> u64
{
    out.extend(right.iter().filter_map(|&xr| {
        best_candidate(
            y,
            left.iter().map(|&xl| (xl, xr, ())),
            dx,
            max_disparity,
            matching_threshold,
            |l, r, _| score(l, r)
        )
    }));
}

/// Keep only the forward matches whose pairing was also chosen by the backward search.
pub fn cross_check(forward: &mut Vec<Match>, backward: &[Match]) {
    forward.retain(|f| {
        backward
            .iter()
            .any(|b| b.x_left == f.x_left && b.x_right == f.x_right)
    });
}

/// Drop matches scoring above `mean * threshold_percent / 100`.
///
/// Does nothing if there are no matches. Returns the number of matches removed.
pub fn relative_pass(matches: &mut Vec<Match>, threshold_percent: u64) -> usize {
    if matches.is_empty() {
        return 0;
    }

    let total: u128 = matches.iter().map(|m| m.score as u128).sum();
    let mean = total / matches.len() as u128;
    let cutoff = mean * threshold_percent as u128 / 100;

    let before = matches.len();
    matches.retain(|m| m.score as u128 <= cutoff);
    before - matches.len()
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            max_disparity_percent: 30,
            compare_radius: 3,
            matching_threshold: 60_000,
            threshold_percent: 80
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
