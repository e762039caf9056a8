// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 64-bit perceptual hash (mean hash over a denoised 8x8 thumbnail).

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::raster::{DENOISE_PIXEL_LIMIT, HASH_PIXEL_LIMIT, QuarterTurn, Raster};

/// Similarity reported when a hash could not be computed.
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

const PREPARE_SIZE: u32 = 32;
const HASH_SIZE: u32 = 8;

/// Fingerprint of an image's coarse visual content. Bit 63 is the top-left
/// cell of the 8x8 grid, bit 0 the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub fn hamming(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// `1 - hamming / 64`.
    pub fn similarity(&self, other: &PerceptualHash) -> f64 {
        1.0 - self.hamming(other) as f64 / 64.0
    }
}

/// Hash `image`, or `None` when it is empty or too large to hash cheaply.
pub fn perceptual_hash(image: &DynamicImage) -> Option<PerceptualHash> {
    let prepared = prepare(image)?;
    Some(hash_thumbnail(prepared.thumbnail, prepared.denoise))
}

/// Hashes of `image` rotated clockwise by 0, 90, 180 and 270 degrees.
pub fn rotation_hashes(image: &DynamicImage) -> [Option<PerceptualHash>; 4] {
    let Some(prepared) = prepare(image) else {
        return [None; 4];
    };
    QuarterTurn::ALL.map(|turn| {
        let rotated = Raster::from_dynamic(DynamicImage::ImageLuma8(prepared.thumbnail.clone()))
            .rotate(turn)
            .to_luma();
        Some(hash_thumbnail(rotated, prepared.denoise))
    })
}

/// Similarity of two optional hashes; neutral when either is missing.
pub fn hash_similarity(a: Option<PerceptualHash>, b: Option<PerceptualHash>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => a.similarity(&b),
        _ => NEUTRAL_SIMILARITY,
    }
}

/// Best similarity between `base` and any orientation of the compare image,
/// along with the winning clockwise rotation in degrees.
pub fn best_rotation_similarity(
    base: Option<PerceptualHash>,
    compare_rotations: &[Option<PerceptualHash>; 4],
) -> (f64, u32) {
    let Some(base) = base else {
        return (NEUTRAL_SIMILARITY, 0);
    };
    let mut best: Option<(f64, u32)> = None;
    for (turn, hash) in QuarterTurn::ALL.iter().zip(compare_rotations.iter()) {
        if let Some(hash) = hash {
            let similarity = base.similarity(hash);
            if best.is_none_or(|(current, _)| similarity > current) {
                best = Some((similarity, turn.degrees()));
            }
        }
    }
    best.unwrap_or((NEUTRAL_SIMILARITY, 0))
}

struct Prepared {
    thumbnail: GrayImage,
    denoise: bool,
}

/// Downscale to 32x32 grayscale once; rotations and hashing work from here.
fn prepare(image: &DynamicImage) -> Option<Prepared> {
    let pixels = image.width() as u64 * image.height() as u64;
    if pixels == 0 || pixels > HASH_PIXEL_LIMIT {
        return None;
    }
    let thumbnail = image
        .resize_exact(PREPARE_SIZE, PREPARE_SIZE, image::imageops::FilterType::Triangle)
        .to_luma8();
    Some(Prepared {
        thumbnail,
        denoise: pixels <= DENOISE_PIXEL_LIMIT,
    })
}

fn hash_thumbnail(thumbnail: GrayImage, denoise: bool) -> PerceptualHash {
    let mut raster = Raster::from_dynamic(DynamicImage::ImageLuma8(thumbnail));
    if denoise {
        raster = raster.denoise(1);
    }
    let cells = raster.resize_exact(HASH_SIZE, HASH_SIZE).to_luma();

    let values: Vec<f64> = cells.pixels().map(|p| p.0[0] as f64).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let mut bits = 0u64;
    for (idx, value) in values.iter().enumerate() {
        if *value > mean {
            bits |= 1u64 << (63 - idx);
        }
    }
    PerceptualHash(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    /// Left half dark, right half light, with a bright block top-left.
    fn asymmetric(size: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
            if x < size / 4 && y < size / 4 {
                Luma([250u8])
            } else if x < size / 2 {
                Luma([20u8])
            } else {
                Luma([200u8])
            }
        }))
    }

    #[test]
    fn identical_images_hash_equal() {
        let a = perceptual_hash(&asymmetric(64)).expect("hashable");
        let b = perceptual_hash(&asymmetric(64)).expect("hashable");
        assert_eq!(a, b);
        assert_eq!(a.similarity(&b), 1.0);
    }

    #[test]
    fn hash_survives_rescaling() {
        let small = perceptual_hash(&asymmetric(64)).expect("hashable");
        let large = perceptual_hash(&asymmetric(256)).expect("hashable");
        assert!(small.similarity(&large) > 0.9);
    }

    #[test]
    fn rotated_copy_is_found() {
        let base = asymmetric(64);
        let rotated = base.rotate90();
        let base_hash = perceptual_hash(&base);
        let (similarity, degrees) = best_rotation_similarity(base_hash, &rotation_hashes(&rotated));
        assert!(similarity > 0.9, "similarity {similarity}");
        assert_eq!(degrees, 270);
    }

    #[test]
    fn oversized_and_empty_images_are_neutral() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(perceptual_hash(&empty).is_none());
        assert_eq!(hash_similarity(None, perceptual_hash(&asymmetric(16))), NEUTRAL_SIMILARITY);
    }

    #[test]
    fn bit_order_is_msb_first() {
        // Only the top-left cell is bright.
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, y| {
            if x < 8 && y < 8 { Luma([255u8]) } else { Luma([0u8]) }
        }));
        let hash = perceptual_hash(&img).expect("hashable");
        assert_ne!(hash.0 & (1u64 << 63), 0);
        assert_eq!(hash.0 & 1, 0);
    }
}
