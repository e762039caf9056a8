// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Matching and differencing of the raster images embedded in a page pair.

use docdelta_core::{ChangeType, DifferenceType, EmbeddedImage, Rect, severity};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::differ::{ImageDiffer, PixelRegion};
use super::phash::{PerceptualHash, best_rotation_similarity, rotation_hashes};
use super::raster::Raster;
use crate::difference::{DifferenceDetail, DifferenceDraft};

/// Rotation-aware hash similarity needed to pair two images by content.
pub const PAIRING_SIMILARITY: f64 = 0.8;

/// Magnitude reported for an image that exists on one side only.
const ONE_SIDED_MAGNITUDE: f64 = 0.5;

/// Cacheable summary of one embedded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSignature {
    pub resource_id: String,
    /// SHA-256 of the encoded bytes, hex.
    pub digest: String,
    pub width: u32,
    pub height: u32,
    /// Hashes of the image rotated clockwise by 0, 90, 180 and 270 degrees.
    pub hashes: [Option<PerceptualHash>; 4],
    pub decodable: bool,
}

impl ImageSignature {
    #[instrument(skip(image), fields(resource_id = %image.resource_id))]
    pub fn compute(image: &EmbeddedImage) -> Self {
        let digest = hex::encode(Sha256::digest(&image.data));
        match Raster::from_bytes(&image.data) {
            Ok(raster) => Self {
                resource_id: image.resource_id.clone(),
                digest,
                width: raster.width(),
                height: raster.height(),
                hashes: rotation_hashes(raster.as_dynamic()),
                decodable: true,
            },
            Err(err) => {
                warn!(error = %err, "embedded image could not be decoded");
                Self {
                    resource_id: image.resource_id.clone(),
                    digest,
                    width: 0,
                    height: 0,
                    hashes: [None; 4],
                    decodable: false,
                }
            }
        }
    }

    pub fn upright_hash(&self) -> Option<PerceptualHash> {
        self.hashes[0]
    }
}

/// An embedded image together with its signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedImage<'a> {
    pub image: &'a EmbeddedImage,
    pub signature: &'a ImageSignature,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pairing {
    Identical,
    ByContent { similarity: f64, degrees: u32 },
    ByPosition,
}

/// Pair the images of two pages and report what changed.
///
/// Identical bytes pair first, then content matches by rotation-aware hash
/// similarity (best first), then whatever is left pairs by position. Paired
/// images scoring above `threshold` are `modified`; the rest are `deleted`
/// or `added`.
#[instrument(skip_all, fields(base = base.len(), compare = compare.len()))]
pub fn compare_page_images(
    base: &[SignedImage<'_>],
    compare: &[SignedImage<'_>],
    differ: &ImageDiffer,
    threshold: f64,
) -> Vec<DifferenceDraft> {
    let mut base_used = vec![false; base.len()];
    let mut compare_used = vec![false; compare.len()];
    let mut pairs: Vec<(usize, usize, Pairing)> = Vec::new();

    for (bi, b) in base.iter().enumerate() {
        let found = compare
            .iter()
            .enumerate()
            .find(|(ci, c)| !compare_used[*ci] && c.signature.digest == b.signature.digest);
        if let Some((ci, _)) = found {
            base_used[bi] = true;
            compare_used[ci] = true;
            pairs.push((bi, ci, Pairing::Identical));
        }
    }

    let mut candidates: Vec<(usize, usize, f64, u32)> = Vec::new();
    for (bi, b) in base.iter().enumerate().filter(|(bi, _)| !base_used[*bi]) {
        for (ci, c) in compare.iter().enumerate().filter(|(ci, _)| !compare_used[*ci]) {
            if b.signature.upright_hash().is_none() {
                continue;
            }
            let (similarity, degrees) =
                best_rotation_similarity(b.signature.upright_hash(), &c.signature.hashes);
            if similarity >= PAIRING_SIMILARITY {
                candidates.push((bi, ci, similarity, degrees));
            }
        }
    }
    candidates.sort_by(|x, y| y.2.total_cmp(&x.2).then(x.0.cmp(&y.0)).then(x.1.cmp(&y.1)));
    for (bi, ci, similarity, degrees) in candidates {
        if base_used[bi] || compare_used[ci] {
            continue;
        }
        base_used[bi] = true;
        compare_used[ci] = true;
        pairs.push((bi, ci, Pairing::ByContent { similarity, degrees }));
    }

    let rest_base: Vec<usize> = (0..base.len()).filter(|i| !base_used[*i]).collect();
    let rest_compare: Vec<usize> = (0..compare.len()).filter(|i| !compare_used[*i]).collect();
    for (&bi, &ci) in rest_base.iter().zip(rest_compare.iter()) {
        base_used[bi] = true;
        compare_used[ci] = true;
        pairs.push((bi, ci, Pairing::ByPosition));
    }

    let mut drafts = Vec::new();
    pairs.sort_by_key(|(bi, ci, _)| (*ci, *bi));
    for (bi, ci, pairing) in pairs {
        if let Some(draft) = compare_pair(base[bi], compare[ci], pairing, differ, threshold) {
            drafts.push(draft);
        }
    }

    for (bi, b) in base.iter().enumerate().filter(|(bi, _)| !base_used[*bi]) {
        debug!(index = bi, resource_id = %b.image.resource_id, "image removed");
        drafts.push(one_sided(b, ChangeType::Deleted));
    }
    for (ci, c) in compare.iter().enumerate().filter(|(ci, _)| !compare_used[*ci]) {
        debug!(index = ci, resource_id = %c.image.resource_id, "image added");
        drafts.push(one_sided(c, ChangeType::Added));
    }
    drafts
}

fn compare_pair(
    base: SignedImage<'_>,
    compare: SignedImage<'_>,
    pairing: Pairing,
    differ: &ImageDiffer,
    threshold: f64,
) -> Option<DifferenceDraft> {
    if pairing == Pairing::Identical {
        return None;
    }

    let decoded = decode(base).zip(decode(compare));
    let (score, region) = match &decoded {
        Some((a, b)) => {
            let score = differ.score(a, b);
            let region = if score > threshold {
                differ.difference_region(a, b)
            } else {
                None
            };
            (score, region)
        }
        None => (1.0, None),
    };
    if score <= threshold {
        return None;
    }

    let rotated = match pairing {
        Pairing::ByContent { degrees, similarity } => {
            debug!(similarity, degrees, "paired by content");
            (degrees != 0).then_some(degrees)
        }
        _ => None,
    };
    let description = match rotated {
        Some(degrees) => format!(
            "Image {} rotated by {degrees}° (difference {:.2})",
            compare.image.resource_id, score
        ),
        None if decoded.is_none() => format!("Image {} could not be decoded", compare.image.resource_id),
        None => format!("Image {} changed (difference {:.2})", compare.image.resource_id, score),
    };

    let same_size = base.signature.width == compare.signature.width
        && base.signature.height == compare.signature.height;
    let base_rect = narrow(base.image.rect, region, base.signature);
    let compare_rect = if same_size {
        narrow(compare.image.rect, region, compare.signature)
    } else {
        compare.image.rect
    };

    Some(DifferenceDraft::new(
        DifferenceDetail::Image {
            resource_id: compare.image.resource_id.clone(),
            score,
            base_rect,
            compare_rect,
        },
        ChangeType::Modified,
        severity(DifferenceType::Image, score),
        description,
    ))
}

fn one_sided(side: &SignedImage<'_>, change: ChangeType) -> DifferenceDraft {
    let (base_rect, compare_rect, verb) = match change {
        ChangeType::Deleted => (side.image.rect, None, "removed"),
        _ => (None, side.image.rect, "added"),
    };
    DifferenceDraft::new(
        DifferenceDetail::Image {
            resource_id: side.image.resource_id.clone(),
            score: 1.0,
            base_rect,
            compare_rect,
        },
        change,
        severity(DifferenceType::Image, ONE_SIDED_MAGNITUDE),
        format!("Image {} {verb}", side.image.resource_id),
    )
}

fn decode(side: SignedImage<'_>) -> Option<DynamicImage> {
    if !side.signature.decodable {
        return None;
    }
    Raster::from_bytes(&side.image.data).ok().map(Raster::into_dynamic)
}

/// Map a pixel region (origin top-left) onto the image's PDF-space placement
/// (origin bottom-left).
fn narrow(rect: Option<Rect>, region: Option<PixelRegion>, signature: &ImageSignature) -> Option<Rect> {
    let rect = rect?;
    let Some(region) = region else {
        return Some(rect);
    };
    if signature.width == 0 || signature.height == 0 {
        return Some(rect);
    }
    let sx = rect.width / signature.width as f64;
    let sy = rect.height / signature.height as f64;
    Some(Rect::new(
        rect.x + region.x as f64 * sx,
        rect.y + rect.height - (region.y + region.height) as f64 * sy,
        region.width as f64 * sx,
        region.height as f64 * sy,
    ))
}
