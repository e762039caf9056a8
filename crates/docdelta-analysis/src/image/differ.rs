// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scalar and spatial difference between two raster images.

use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument};

use super::phash::{best_rotation_similarity, perceptual_hash, rotation_hashes};
use super::raster::Raster;
use super::ssim::ssim_difference;

/// Normalized RGB distance above which two pixels count as different.
pub const PIXEL_THRESHOLD: f64 = 0.1;

/// Weight of the SSIM term when the images differ in size.
pub const SSIM_WEIGHT: f64 = 0.7;

/// Bounding box of changed pixels, in base-image pixel coordinates
/// (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ImageDiffer {
    pixel_threshold: f64,
    ssim_weight: f64,
}

impl Default for ImageDiffer {
    fn default() -> Self {
        Self {
            pixel_threshold: PIXEL_THRESHOLD,
            ssim_weight: SSIM_WEIGHT,
        }
    }
}

impl ImageDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Difference in [0, 1]; 0 means identical.
    ///
    /// Equal-sized images are scored by SSIM alone. Otherwise the compare
    /// image is resampled to the base size for SSIM and the result is blended
    /// with the pixel difference ratio over the overlapping region.
    #[instrument(skip_all, fields(
        base = ?(base.width(), base.height()),
        compare = ?(compare.width(), compare.height()),
    ))]
    pub fn score(&self, base: &DynamicImage, compare: &DynamicImage) -> f64 {
        if is_empty(base) || is_empty(compare) {
            return 1.0;
        }

        let base_gray = base.to_luma8();
        if base.width() == compare.width() && base.height() == compare.height() {
            return ssim_difference(&base_gray, &compare.to_luma8());
        }

        let resampled = Raster::from_dynamic(compare.clone())
            .resize_exact(base.width(), base.height())
            .to_luma();
        let d_ssim = ssim_difference(&base_gray, &resampled);
        let d_pixel = self.pixel_difference_ratio(base, compare).unwrap_or(1.0);
        let blended = self.ssim_weight * d_ssim + (1.0 - self.ssim_weight) * d_pixel;
        debug!(d_ssim, d_pixel, blended, "blended size-mismatch score");

        if blended.is_finite() {
            blended.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Share of overlapping pixels whose colours differ by more than the
    /// threshold, or `None` when there is no overlap.
    pub fn pixel_difference_ratio(&self, base: &DynamicImage, compare: &DynamicImage) -> Option<f64> {
        let a = base.to_rgb8();
        let b = compare.to_rgb8();
        let (width, height) = overlap(&a, &b)?;

        let mut differing = 0u64;
        for y in 0..height {
            for x in 0..width {
                if self.pixels_differ(&a, &b, x, y) {
                    differing += 1;
                }
            }
        }
        Some(differing as f64 / (width as u64 * height as u64) as f64)
    }

    /// Bounding box of the changed pixels. When the images differ in size
    /// and the overlap is unchanged, the whole base image is reported.
    pub fn difference_region(&self, base: &DynamicImage, compare: &DynamicImage) -> Option<PixelRegion> {
        let a = base.to_rgb8();
        let b = compare.to_rgb8();
        let same_size = a.dimensions() == b.dimensions();
        let Some((width, height)) = overlap(&a, &b) else {
            return whole(&a);
        };

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut found = false;
        for y in 0..height {
            for x in 0..width {
                if self.pixels_differ(&a, &b, x, y) {
                    found = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        match (found, same_size) {
            (true, _) => Some(PixelRegion {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            }),
            (false, true) => None,
            (false, false) => whole(&a),
        }
    }

    /// Best perceptual-hash similarity between `base` and `compare` rotated
    /// by any quarter turn, with the winning clockwise rotation in degrees.
    pub fn rotation_similarity(&self, base: &DynamicImage, compare: &DynamicImage) -> (f64, u32) {
        best_rotation_similarity(perceptual_hash(base), &rotation_hashes(compare))
    }

    fn pixels_differ(&self, a: &RgbImage, b: &RgbImage, x: u32, y: u32) -> bool {
        let pa = a.get_pixel(x, y).0;
        let pb = b.get_pixel(x, y).0;
        let mut sum = 0.0;
        for channel in 0..3 {
            let d = (pa[channel] as f64 - pb[channel] as f64) / 255.0;
            sum += d * d;
        }
        sum.sqrt() / 3f64.sqrt() > self.pixel_threshold
    }
}

fn is_empty(image: &DynamicImage) -> bool {
    image.width() == 0 || image.height() == 0
}

fn overlap(a: &RgbImage, b: &RgbImage) -> Option<(u32, u32)> {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    (width > 0 && height > 0).then_some((width, height))
}

fn whole(image: &RgbImage) -> Option<PixelRegion> {
    (image.width() > 0 && image.height() > 0).then_some(PixelRegion {
        x: 0,
        y: 0,
        width: image.width(),
        height: image.height(),
    })
}
