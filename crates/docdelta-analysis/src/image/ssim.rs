// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windowed structural similarity (SSIM) over grayscale images.

use image::GrayImage;

/// Side length of the non-overlapping SSIM windows.
pub const WINDOW: u32 = 8;

/// Dynamic range of 8-bit luma.
const DYNAMIC_RANGE: f64 = 255.0;
const C1: f64 = (0.01 * DYNAMIC_RANGE) * (0.01 * DYNAMIC_RANGE);
const C2: f64 = (0.03 * DYNAMIC_RANGE) * (0.03 * DYNAMIC_RANGE);

/// Mean SSIM over 8x8 non-overlapping windows, in [-1, 1].
///
/// Returns `None` for empty or differently sized inputs, or if the maths
/// produced a non-finite value. Images smaller than one window in either
/// direction are scored as a single window; partial windows at the right
/// and bottom edges are ignored.
pub fn ssim(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (width, height) = a.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let win_w = WINDOW.min(width);
    let win_h = WINDOW.min(height);

    let mut total = 0.0;
    let mut windows = 0u32;
    let mut y = 0;
    while y + win_h <= height {
        let mut x = 0;
        while x + win_w <= width {
            total += window_ssim(a, b, x, y, win_w, win_h);
            windows += 1;
            x += win_w;
        }
        y += win_h;
    }

    let mean = total / windows as f64;
    mean.is_finite().then_some(mean)
}

fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    let n = (w * h) as f64;
    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            sum_a += a.get_pixel(x, y).0[0] as f64;
            sum_b += b.get_pixel(x, y).0[0] as f64;
        }
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let (mut var_a, mut var_b, mut cov) = (0.0, 0.0, 0.0);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let da = a.get_pixel(x, y).0[0] as f64 - mean_a;
            let db = b.get_pixel(x, y).0[0] as f64 - mean_b;
            var_a += da * da;
            var_b += db * db;
            cov += da * db;
        }
    }
    var_a /= n;
    var_b /= n;
    cov /= n;

    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
    numerator / denominator
}

/// Map SSIM to a difference in [0, 1]: `1 - (s + 1) / 2`. Failures map to
/// 1.0 so a broken computation never reads as identical.
pub fn ssim_difference(a: &GrayImage, b: &GrayImage) -> f64 {
    match ssim(a, b) {
        Some(similarity) => (1.0 - (similarity + 1.0) / 2.0).clamp(0.0, 1.0),
        None => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
    }

    #[test]
    fn identical_images_score_one() {
        let img = gradient(40, 24);
        let s = ssim(&img, &img).expect("same size");
        assert!((s - 1.0).abs() < 1e-12);
        assert!(ssim_difference(&img, &img) < 1e-12);
    }

    #[test]
    fn inverted_image_is_far_apart() {
        let img = gradient(32, 32);
        let inverted = GrayImage::from_fn(32, 32, |x, y| Luma([255 - img.get_pixel(x, y).0[0]]));
        assert!(ssim_difference(&img, &inverted) > 0.4);
    }

    #[test]
    fn tiny_images_use_one_window() {
        let a = GrayImage::from_pixel(3, 2, Luma([10u8]));
        let b = GrayImage::from_pixel(3, 2, Luma([10u8]));
        assert!((ssim(&a, &b).expect("scored") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn size_mismatch_and_empty_are_max_difference() {
        assert_eq!(ssim_difference(&gradient(8, 8), &gradient(16, 8)), 1.0);
        assert_eq!(ssim_difference(&GrayImage::new(0, 0), &GrayImage::new(0, 0)), 1.0);
    }
}
