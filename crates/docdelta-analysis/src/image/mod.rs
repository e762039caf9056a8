// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image comparison: raster preparation, SSIM, perceptual hashing,
// embedded-image matching and whole-page render comparison.

pub mod differ;
pub mod embedded;
pub mod page_render;
pub mod phash;
pub mod raster;
pub mod ssim;

pub use differ::{ImageDiffer, PixelRegion};
pub use embedded::{ImageSignature, SignedImage, compare_page_images};
pub use page_render::compare_page_renders;
pub use phash::{PerceptualHash, hash_similarity, perceptual_hash};
pub use raster::{QuarterTurn, Raster, blank_rgb};
