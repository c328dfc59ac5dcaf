//! # Gabor filter bank
//!
//! A bank of 1D Gabor filters, `no_of_masks` phases for each frequency, convolved along image
//! rows to give a response vector per pixel. The bank is cached and only rebuilt when the image
//! width or the bank parameters change.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GaborParams {
    /// Spatial frequencies in cycles per pixel.
    pub frequencies: Vec<f32>,

    /// Number of phases per frequency.
    pub no_of_masks: usize,

    pub min_phase_degrees: f32,
    pub max_phase_degrees: f32,

    /// Standard deviation of the Gaussian envelope in pixels.
    pub envelope_sigma: f32
}

/// Precomputed Gabor masks.
#[derive(Debug, Default)]
pub struct FilterBank {
    masks: Vec<Vec<f32>>,
    support: usize,
    key: Option<(usize, GaborParams)>,
    rebuilds: u64
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Support of a filter, `2 * ceil(max(a, b)) + 1`, with `a` the envelope sigma and `b` half
/// the wavelength.
pub fn support_size(frequency: f32, sigma: f32) -> usize {
    let half_wavelength = if frequency > 0.0 { 0.5 / frequency } else { 0.0 };
    2 * sigma.max(half_wavelength).ceil() as usize + 1
}

/// Build one zero-mean Gabor mask, normalised to unit absolute sum.
pub fn gabor_mask(frequency: f32, phase_radians: f32, sigma: f32) -> Vec<f32> {
    let support = support_size(frequency, sigma);
    let half = (support / 2) as f32;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut mask: Vec<f32> = (0..support)
        .map(|i| {
            let x = i as f32 - half;
            (-(x * x) / two_sigma_sq).exp()
                * (2.0 * std::f32::consts::PI * frequency * x + phase_radians).cos()
        })
        .collect();

    let mean = mask.iter().sum::<f32>() / support as f32;
    mask.iter_mut().for_each(|v| *v -= mean);

    let norm: f32 = mask.iter().map(|v| v.abs()).sum();
    if norm > 0.0 {
        mask.iter_mut().for_each(|v| *v /= norm);
    }

    mask
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for GaborParams {
    fn default() -> Self {
        Self {
            frequencies: vec![0.1, 0.2],
            no_of_masks: 4,
            min_phase_degrees: 0.0,
            max_phase_degrees: 135.0,
            envelope_sigma: 2.5
        }
    }
}

impl FilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the bank matches the given parameters and width, rebuilding it if not.
    ///
    /// Returns `true` if the bank was rebuilt.
    pub fn ensure(&mut self, params: &GaborParams, width: usize) -> bool {
        if let Some((w, p)) = &self.key {
            if *w == width && p == params {
                return false;
            }
        }

        self.masks.clear();

        let n = params.no_of_masks.max(1);
        for &frequency in &params.frequencies {
            for i in 0..n {
                let phase_degrees = if n > 1 {
                    params.min_phase_degrees
                        + (params.max_phase_degrees - params.min_phase_degrees) * i as f32
                            / (n - 1) as f32
                }
                else {
                    params.min_phase_degrees
                };

                self.masks.push(gabor_mask(
                    frequency,
                    phase_degrees.to_radians(),
                    params.envelope_sigma
                ));
            }
        }

        self.support = self.masks.iter().map(|m| m.len()).max().unwrap_or(0);
        self.key = Some((width, params.clone()));
        self.rebuilds += 1;

        log::debug!(
            "Built Gabor bank of {} masks, support {}px, for width {}",
            self.masks.len(), self.support, width
        );

        true
    }

    pub fn masks(&self) -> &[Vec<f32>] {
        &self.masks
    }

    /// Number of responses produced per pixel.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Widest mask in the bank.
    pub fn support(&self) -> usize {
        self.support
    }

    /// Number of times the bank has been built.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Convolve one row with every mask.
    ///
    /// `out[x * self.len() + m]` receives mask `m`'s response at `x`. Pixels where the widest
    /// mask leaves the row respond with zero. When `anticorrelated` is set the row is read as
    /// `255 - pixel`.
    pub fn convolve_row(&self, row: &[u8], anticorrelated: bool, out: &mut [f32]) {
        let n = self.masks.len();
        let w = row.len();
        let half = self.support / 2;

        out.iter_mut().for_each(|v| *v = 0.0);

        if w <= 2 * half {
            return;
        }

        let sample = |x: usize| -> f32 {
            if anticorrelated {
                255.0 - row[x] as f32
            }
            else {
                row[x] as f32
            }
        };

        for x in half..(w - half) {
            for (m, mask) in self.masks.iter().enumerate() {
                let mh = mask.len() / 2;
                let acc: f32 = mask
                    .iter()
                    .enumerate()
                    .map(|(k, &g)| g * sample(x + k - mh))
                    .sum();
                out[x * n + m] = acc;
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
