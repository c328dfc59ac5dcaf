//! # Mono conversion
//!
//! Reduction of interleaved colour buffers to a single intensity (or hue) channel.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::scratch::ensure_len;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How three colour channels are combined into one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonoMode {
    /// Mean of the three channels.
    Magnitude,
    /// ITU-R 601 weighted luminance.
    Luminance,
    /// HSV hue scaled to `0..=255`, zero for unsaturated pixels.
    Hue
}

/// Order of the interleaved channels in a colour buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    Rgb,
    Bgr
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Convert a colour buffer into a single channel.
///
/// A buffer which already has one sample per pixel is returned as is. Otherwise the result is
/// written into `scratch`, which keeps its allocation if it is already the right length.
pub fn convert<'a>(
    src: &'a [u8],
    width: usize,
    height: usize,
    mode: MonoMode,
    order: ChannelOrder,
    scratch: &'a mut Vec<u8>
) -> Result<&'a [u8]> {
    let pixels = width * height;

    if src.len() == pixels {
        return Ok(src);
    }

    if src.len() != pixels * 3 {
        return Err(Error::BufferSize { expected: pixels * 3, actual: src.len() });
    }

    ensure_len(scratch, pixels);

    for (dst, px) in scratch.iter_mut().zip(src.chunks_exact(3)) {
        let (r, g, b) = match order {
            ChannelOrder::Rgb => (px[0], px[1], px[2]),
            ChannelOrder::Bgr => (px[2], px[1], px[0])
        };

        *dst = match mode {
            MonoMode::Magnitude => ((r as u32 + g as u32 + b as u32) / 3) as u8,
            MonoMode::Luminance => luminance(r, g, b),
            MonoMode::Hue => hue(r, g, b)
        };
    }

    Ok(&scratch[..])
}

/// ITU-R 601 luminance, in fixed point.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// HSV hue mapped from degrees onto `0..=255`.
pub fn hue(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;

    if chroma <= 0.0 {
        return 0;
    }

    let mut h = if max == r {
        60.0 * ((g - b) / chroma)
    }
    else if max == g {
        60.0 * ((b - r) / chroma + 2.0)
    }
    else {
        60.0 * ((r - g) / chroma + 4.0)
    };

    if h < 0.0 {
        h += 360.0;
    }

    (h * 255.0 / 360.0).round().min(255.0) as u8
}

/// Average blocks of `factor` rows into one, returning the compressed height.
///
/// Trailing rows which do not fill a whole block are folded into the last output row.
pub fn compress_rows(
    mono: &[u8],
    width: usize,
    height: usize,
    factor: usize,
    out: &mut Vec<u8>
) -> usize {
    let factor = factor.max(1);
    let compressed = (height / factor).max(1);

    ensure_len(out, width * compressed);

    for cy in 0..compressed {
        let y0 = cy * factor;
        let y1 = if cy == compressed - 1 { height } else { y0 + factor };
        let rows = (y1 - y0) as u32;

        for x in 0..width {
            let sum: u32 = (y0..y1).map(|y| mono[y * width + x] as u32).sum();
            out[cy * width + x] = (sum / rows) as u8;
        }
    }

    compressed
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
