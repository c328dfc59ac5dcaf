//! # General disparity objects
//!
//! This module provides the frame, feature and disparity map types shared by every
//! correspondence algorithm, along with the trait they all implement.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A rectified stereo pair borrowed from the caller for the duration of one update.
///
/// Both buffers are row-major and either one byte per pixel (mono) or three interleaved bytes
/// per pixel (colour).
#[derive(Clone, Copy, Debug)]
pub struct StereoFrame<'a> {
    pub left: &'a [u8],
    pub right: &'a [u8],
    pub width: usize,
    pub height: usize
}

/// Residual pixel shift between the two cameras, applied additively when looking up the
/// corresponding column (`dx`) and row (`dy`) in the right image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Calibration {
    pub dx: f32,
    pub dy: f32
}

/// A left image location and the horizontal disparity recovered for it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StereoFeature {
    pub x: f32,
    pub y: f32,
    pub disparity: f32,

    /// Colour of the left pixel, filled in by the colour variant for visualisation.
    pub colour: Option<[u8; 3]>
}

/// A dense disparity map, stored ready for display as three identical channels per pixel.
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<u8>,
    pub max_disp: Option<usize>
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait CorrespondenceAlgorithm {
    /// Run the algorithm over the given frame, replacing any previous output.
    ///
    /// A malformed frame is rejected before any output is touched.
    fn update(&mut self, frame: &StereoFrame, calib: Calibration) -> Result<()>;

    /// Sparse features found by the last successful update.
    fn features(&self) -> &[StereoFeature];

    /// Dense disparity map from the last successful update, for algorithms which build one.
    fn disparity_map(&self) -> Option<&DisparityMap> {
        None
    }

    /// Number of times the algorithm's scratch buffers have been sized for a new geometry.
    fn scratch_generation(&self) -> u64;
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Exclusive upper bound on disparity for an image of the given width.
pub fn max_disparity_pixels(width: usize, max_disparity_percent: usize) -> usize {
    width * max_disparity_percent / 100
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<'a> StereoFrame<'a> {
    pub fn new(left: &'a [u8], right: &'a [u8], width: usize, height: usize) -> Self {
        Self { left, right, width, height }
    }

    /// Number of interleaved channels in the frame, checking that both buffers agree with the
    /// stated dimensions.
    pub fn channels(&self) -> Result<usize> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Dimensions { width: self.width, height: self.height });
        }

        if self.left.len() != self.right.len() {
            return Err(Error::FrameMismatch {
                left: self.left.len(),
                right: self.right.len()
            });
        }

        let pixels = self.width * self.height;
        match self.left.len() {
            n if n == pixels => Ok(1),
            n if n == pixels * 3 => Ok(3),
            n => Err(Error::BufferSize { expected: pixels, actual: n })
        }
    }

    /// Check that the frame carries exactly `channels` samples per pixel.
    pub fn require_channels(&self, channels: usize) -> Result<()> {
        let found = self.channels()?;

        if found != channels {
            return Err(Error::BufferSize {
                expected: self.width * self.height * channels,
                actual: self.left.len()
            });
        }

        Ok(())
    }
}

impl Calibration {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    /// Check that the offset is finite and smaller than the image in each axis.
    pub fn check(&self, width: usize, height: usize) -> Result<()> {
        let fits = |v: f32, limit: usize| v.is_finite() && v.round().abs() < limit as f32;

        if fits(self.dx, width) && fits(self.dy, height) {
            Ok(())
        }
        else {
            Err(Error::Calibration { dx: self.dx, dy: self.dy, width, height })
        }
    }

    /// Horizontal offset rounded to whole pixels.
    pub fn dx_pixels(&self) -> isize {
        self.dx.round() as isize
    }

    /// Vertical offset rounded to whole pixels.
    pub fn dy_pixels(&self) -> isize {
        self.dy.round() as isize
    }
}

impl StereoFeature {
    pub fn new(x: f32, y: f32, disparity: f32) -> Self {
        Self { x, y, disparity, colour: None }
    }
}

impl DisparityMap {
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            width,
            height,
            data: vec![0; width * height * 3],
            max_disp: None
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Zero the map, reallocating only when the geometry differs from the current one.
    pub fn reset(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.data = vec![0; width * height * 3];
        }
        else {
            self.data.iter_mut().for_each(|v| *v = 0);
        }
        self.max_disp = None;
    }

    pub fn put(&mut self, x: usize, y: usize, val: u8) {
        let n = (y * self.width + x) * 3;
        self.data[n..n + 3].copy_from_slice(&[val; 3]);
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[(y * self.width + x) * 3]
    }

    /// Raw `width * height * 3` byte buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Converts the map into a Luma8 image.
    pub fn to_luma(&self) -> GrayImage {

        let mut new = image::GrayImage::new(
            self.width as u32,
            self.height as u32
        );

        for y in 0..new.height() {
            for x in 0..new.width() {
                *new.get_pixel_mut(x, y) = image::Luma([self.get(x as usize, y as usize)]);
            }
        }

        new
    }

    /// Converts the map into an Rgb8 image, each channel carrying the same value.
    pub fn to_rgb(&self) -> RgbImage {
        // Buffer length always matches the stored geometry
        RgbImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
