//! Pairwise PNG comparison
//!
//! All three operations decode both inputs, bring them to equal dimensions
//! with [`normalize_pair`], and then work per pixel on 8-bit RGBA values.
//! None of them needs a live session.

use crate::{Error, Result};
use image::{Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Channel delta above which the diff image marks a pixel red
pub const DIFF_IMAGE_THRESHOLD: u8 = 10;

const MAX_MSE: f64 = 255.0 * 255.0;
const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn decode(bytes: &[u8], which: &str) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| Error::ImageDecode(format!("{} image: {}", which, e)))
}

/// Nearest-neighbour resample using plain ratio mapping (no pixel-center
/// offset, no smoothing).
pub fn scale_nearest(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let x_ratio = src.width() as f64 / width as f64;
    let y_ratio = src.height() as f64 / height as f64;
    RgbaImage::from_fn(width, height, |x, y| {
        let sx = ((x as f64 * x_ratio) as u32).min(src.width().saturating_sub(1));
        let sy = ((y as f64 * y_ratio) as u32).min(src.height().saturating_sub(1));
        *src.get_pixel(sx, sy)
    })
}

/// Bring two images to the same size. The first image is downscaled when it
/// is wider or taller than the second; otherwise the second is scaled to the
/// first.
pub fn normalize_pair(a: RgbaImage, b: RgbaImage) -> (RgbaImage, RgbaImage) {
    if a.dimensions() == b.dimensions() {
        return (a, b);
    }
    if a.width() > b.width() || a.height() > b.height() {
        let a = scale_nearest(&a, b.width(), b.height());
        (a, b)
    } else {
        let b = scale_nearest(&b, a.width(), a.height());
        (a, b)
    }
}

fn decode_pair(a: &[u8], b: &[u8]) -> Result<(RgbaImage, RgbaImage)> {
    let first = decode(a, "first")?;
    let second = decode(b, "second")?;
    Ok(normalize_pair(first, second))
}

fn channel_deltas(p: &Rgba<u8>, q: &Rgba<u8>) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, d) in out.iter_mut().enumerate() {
        *d = p.0[i].abs_diff(q.0[i]);
    }
    out
}

/// Similarity in `[0, 1]` from the mean squared error over all four
/// channels; `1.0` means identical after normalization.
pub fn compare_images(a: &[u8], b: &[u8]) -> Result<f64> {
    let (a, b) = decode_pair(a, b)?;
    let samples = a.width() as u64 * a.height() as u64 * 4;
    if samples == 0 {
        return Ok(1.0);
    }

    let total: f64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(p, q)| {
            channel_deltas(p, q)
                .iter()
                .map(|d| (*d as f64) * (*d as f64))
                .sum::<f64>()
        })
        .sum();

    let mse = total / samples as f64;
    Ok(1.0 - (mse / MAX_MSE).min(1.0))
}

/// Number of pixels where any channel differs by more than `threshold`.
pub fn pixel_difference_count(a: &[u8], b: &[u8], threshold: u8) -> Result<usize> {
    let (a, b) = decode_pair(a, b)?;
    Ok(a
        .pixels()
        .zip(b.pixels())
        .filter(|(p, q)| channel_deltas(p, q).iter().any(|d| *d > threshold))
        .count())
}

/// Render differing pixels red over a grayscale copy of the first image and
/// return it as PNG. When `out` is given the PNG is also written there.
pub fn create_diff_image(a: &[u8], b: &[u8], out: Option<&Path>) -> Result<Vec<u8>> {
    let (a, b) = decode_pair(a, b)?;

    let diff = RgbaImage::from_fn(a.width(), a.height(), |x, y| {
        let p = a.get_pixel(x, y);
        let q = b.get_pixel(x, y);
        if channel_deltas(p, q).iter().any(|d| *d > DIFF_IMAGE_THRESHOLD) {
            DIFF_COLOR
        } else {
            let [r, g, b, alpha] = p.0;
            let gray = ((r as u16 + g as u16 + b as u16) / 3) as u8;
            Rgba([gray, gray, gray, alpha])
        }
    });

    let mut buf = Cursor::new(Vec::new());
    diff.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| Error::ImageEncode(e.to_string()))?;
    let bytes = buf.into_inner();

    if let Some(path) = out {
        std::fs::write(path, &bytes)?;
        log::debug!("wrote diff image to {}", path.display());
    }
    Ok(bytes)
}
