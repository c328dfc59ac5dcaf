//! # Dense Gabor disparity
//!
//! Every row of both images is convolved with a bank of Gabor filters, the right image with
//! inverted polarity. For each left pixel the disparity maximising the normalised similarity of
//! the two response vectors, penalised by the mismatch of response energy around the pair, is
//! written into a dense disparity map.
//!
//! Pixels whose full disparity range lies inside the right row are searched from the left
//! image. The remaining pixels at the start of the row are filled by a second scan anchored on
//! the right image.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::algorithms::{shifted_row, validate};
use crate::disparity::*;
use crate::error::*;
use crate::gabor::{FilterBank, GaborParams};
use crate::mono::{self, ChannelOrder, MonoMode};
use crate::scratch::{ensure_len, ScratchArena};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DenseParams {
    pub gabor: GaborParams,

    /// Maximum disparity as a percentage of the image width.
    pub max_disparity_percent: usize,

    /// Left pixels whose local intensity range is below this are left at zero.
    pub minimum_intensity: u8,

    /// Radius of the neighbourhood used for the intensity range.
    pub contrast_radius: usize
}

pub struct Dense {
    params: DenseParams,
    arena: ScratchArena,
    bank: FilterBank,
    mono_left: Vec<u8>,
    mono_right: Vec<u8>,
    left_resp: Vec<f32>,
    right_resp: Vec<f32>,
    left_energy: Vec<f32>,
    right_energy: Vec<f32>,
    best_score: Vec<f32>,
    best_disp: Vec<usize>,
    map: DisparityMap
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Absolute normalised correlation of two response vectors, zero if either is null.
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;

    for (p, q) in a.iter().zip(b) {
        dot += p * q;
        na += p * p;
        nb += q * q;
    }

    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }

    (dot / (na.sqrt() * nb.sqrt())).abs()
}

/// `1 + Σ((eL - eR) / 255)²` over the three pixel window centred on the pair.
fn energy_penalty(left: &[f32], xl: usize, right: &[f32], xr: usize) -> f32 {
    let mut ssd = 1.0;

    for k in 0..3 {
        let (l, r) = match (
            (xl + k).checked_sub(1).and_then(|i| left.get(i)),
            (xr + k).checked_sub(1).and_then(|i| right.get(i))
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => continue
        };

        let d = (l - r) / 255.0;
        ssd += d * d;
    }

    ssd
}

/// Range of intensities within `radius` of `x`.
fn local_range(row: &[u8], x: usize, radius: usize) -> u8 {
    let lo = x.saturating_sub(radius);
    let hi = (x + radius + 1).min(row.len());

    let (min, max) = row[lo..hi]
        .iter()
        .fold((u8::MAX, u8::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));

    max.saturating_sub(min)
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for DenseParams {
    fn default() -> Self {
        Self {
            gabor: GaborParams::default(),
            max_disparity_percent: 10,
            minimum_intensity: 10,
            contrast_radius: 2
        }
    }
}

impl Dense {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: DenseParams) -> Self {
        Self {
            params,
            arena: ScratchArena::new(),
            bank: FilterBank::new(),
            mono_left: Vec::new(),
            mono_right: Vec::new(),
            left_resp: Vec::new(),
            right_resp: Vec::new(),
            left_energy: Vec::new(),
            right_energy: Vec::new(),
            best_score: Vec::new(),
            best_disp: Vec::new(),
            map: DisparityMap::new(0, 0)
        }
    }

    pub fn params(&self) -> &DenseParams {
        &self.params
    }

    /// The filter bank, as built for the last frame.
    pub fn filter_bank(&self) -> &FilterBank {
        &self.bank
    }
}

impl CorrespondenceAlgorithm for Dense {
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()> {
        validate(frame, &calib, None, "dense")?;

        let (w, h) = (frame.width, frame.height);
        self.arena.prepare(w, h);
        self.bank.ensure(&self.params.gabor, w);

        let n = self.bank.len();
        ensure_len(&mut self.left_resp, w * n);
        ensure_len(&mut self.right_resp, w * n);
        ensure_len(&mut self.left_energy, w);
        ensure_len(&mut self.right_energy, w);
        ensure_len(&mut self.best_score, w);
        ensure_len(&mut self.best_disp, w);

        let left = mono::convert(
            frame.left, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_left
        )?;
        let right = mono::convert(
            frame.right, w, h, MonoMode::Magnitude, ChannelOrder::Rgb, &mut self.mono_right
        )?;

        let max_disp = max_disparity_pixels(w, self.params.max_disparity_percent);
        self.map.reset(w, h);
        self.map.max_disp = Some(max_disp);

        if self.bank.is_empty() || max_disp == 0 {
            log::debug!("dense: nothing to search, map left empty");
            return Ok(());
        }

        if self.bank.support() > w / 4 {
            log::warn!(
                "dense: filter support {}px exceeds a quarter of the {}px width, skipping convolution",
                self.bank.support(), w
            );
            return Ok(());
        }

        let half = self.bank.support() / 2;
        let dx = calib.dx_pixels();
        let dy = calib.dy_pixels();
        let radius = self.params.contrast_radius;
        let minimum_intensity = self.params.minimum_intensity;

        // First left pixel whose whole disparity range lands on valid right responses
        let anchor_start = (half as isize + max_disp as isize - 1 - dx).max(half as isize) as usize;
        let mut assigned = 0usize;

        for y in 0..h {
            let yr = match shifted_row(y, dy, h) {
                Some(yr) => yr,
                None => continue
            };

            let left_row = &left[y * w..(y + 1) * w];
            let right_row = &right[yr * w..(yr + 1) * w];

            self.bank.convolve_row(left_row, false, &mut self.left_resp);
            self.bank.convolve_row(right_row, true, &mut self.right_resp);

            for x in 0..w {
                self.left_energy[x] = self.left_resp[x * n..(x + 1) * n].iter().map(|v| v.abs()).sum();
                self.right_energy[x] = self.right_resp[x * n..(x + 1) * n].iter().map(|v| v.abs()).sum();
            }

            self.best_score.iter_mut().for_each(|v| *v = 0.0);
            self.best_disp.iter_mut().for_each(|v| *v = 0);

            let left_resp = &self.left_resp;
            let right_resp = &self.right_resp;
            let left_energy = &self.left_energy;
            let right_energy = &self.right_energy;

            let score = |xl: usize, xr: usize| {
                similarity(&left_resp[xl * n..(xl + 1) * n], &right_resp[xr * n..(xr + 1) * n])
                    / energy_penalty(left_energy, xl, right_energy, xr)
            };

            // Left anchored
            for xl in anchor_start..(w - half) {
                for d in 0..max_disp {
                    let xr = xl as isize + dx - d as isize;
                    if xr < half as isize || xr >= (w - half) as isize {
                        continue;
                    }

                    let s = score(xl, xr as usize);
                    if s > self.best_score[xl] {
                        self.best_score[xl] = s;
                        self.best_disp[xl] = d;
                    }
                }
            }

            // Right anchored, filling the left pixels the first scan could not cover
            for xr in half..(w - half) {
                for d in 0..max_disp {
                    let xl = xr as isize - dx + d as isize;
                    if xl < half as isize || xl >= anchor_start.min(w - half) as isize {
                        continue;
                    }

                    let xl = xl as usize;
                    let s = score(xl, xr);
                    if s > self.best_score[xl] {
                        self.best_score[xl] = s;
                        self.best_disp[xl] = d;
                    }
                }
            }

            for x in half..(w - half) {
                if self.best_score[x] <= 0.0 || local_range(left_row, x, radius) < minimum_intensity {
                    continue;
                }

                self.map.put(x, y, (self.best_disp[x] * 255 / max_disp) as u8);
                assigned += 1;
            }
        }

        log::debug!(
            "dense: {} of {} pixels assigned, max disparity {}px",
            assigned, w * h, max_disp
        );

        Ok(())
    }

    fn features(&self) -> &[StereoFeature] {
        &[]
    }

    fn disparity_map(&self) -> Option<&DisparityMap> {
        Some(&self.map)
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
    fn identical_images_give_zero_disparity() {
        let img = texture(320, 240, 0);
        let mut alg = Dense::new(DenseParams::default());

        alg.update(&StereoFrame::new(&img, &img, 320, 240), Calibration::default()).unwrap();

        let map = alg.disparity_map().unwrap();
        let zero = map.as_bytes().iter().filter(|&&v| v == 0).count();
        assert!(zero * 100 >= map.as_bytes().len() * 99, "{} zero", zero);
    }

    #[test]
    fn shifted_texture_gives_quantised_disparity() {
        let left = texture(320, 60, 0);
        let right = texture(320, 60, 4);
        let mut alg = Dense::new(DenseParams::default());

        alg.update(&StereoFrame::new(&left, &right, 320, 60), Calibration::default()).unwrap();

        let map = alg.disparity_map().unwrap();
        assert_eq!(map.max_disp, Some(32));

        let (mut total, mut correct) = (0, 0);
        for y in 0..60 {
            for x in 40..310 {
                total += 1;
                if map.get(x, y) == (4 * 255 / 32) as u8 {
                    correct += 1;
                }
            }
        }
        assert!(correct * 10 >= total * 8, "{} of {} correct", correct, total);
    }

    #[test]
    fn flat_images_give_empty_map() {
        let flat = vec![70u8; 320 * 40];
        let mut alg = Dense::new(DenseParams::default());

        alg.update(&StereoFrame::new(&flat, &flat, 320, 40), Calibration::default()).unwrap();
        assert!(alg.disparity_map().unwrap().as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn oversized_bank_skips_convolution() {
        let img = texture(32, 8, 0);
        let mut alg = Dense::new(DenseParams::default());

        alg.update(&StereoFrame::new(&img, &img, 32, 8), Calibration::default()).unwrap();

        let map = alg.disparity_map().unwrap();
        assert_eq!((map.width(), map.height()), (32, 8));
        assert!(map.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn bank_is_reused_across_frames() {
        let img = texture(160, 20, 0);
        let mut alg = Dense::new(DenseParams::default());

        for _ in 0..3 {
            alg.update(&StereoFrame::new(&img, &img, 160, 20), Calibration::default()).unwrap();
        }

        assert_eq!(alg.filter_bank().rebuilds(), 1);
        assert_eq!(alg.scratch_generation(), 1);
    }

    #[test]
    fn similarity_ignores_sign_and_scale() {
        let a = [1.0, -2.0, 0.5];
        let b = [-2.0, 4.0, -1.0];
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert_eq!(similarity(&a, &[0.0; 3]), 0.0);
    }
}
