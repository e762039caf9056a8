// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster preparation for the image comparison algorithms: decoding,
// resizing, quarter-turn rotation, grayscale conversion and median denoise.

use docdelta_core::CompareError;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::filter::median_filter;
use tracing::{debug, instrument};

/// Images above this many pixels skip the median denoise step.
pub const DENOISE_PIXEL_LIMIT: u64 = 1_000_000;

/// Images above this many pixels skip hashing entirely.
pub const HASH_PIXEL_LIMIT: u64 = 5_000_000;

/// Clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl QuarterTurn {
    pub const ALL: [QuarterTurn; 4] = [Self::None, Self::Cw90, Self::Cw180, Self::Cw270];

    pub fn degrees(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }
}

/// Preparation pipeline over a single in-memory image.
///
/// Each method consumes `self` and returns the transformed raster, so steps
/// chain:
///
/// ```ignore
/// let gray = Raster::from_bytes(&bytes)?
///     .resize_exact(32, 32)
///     .grayscale()
///     .denoise(1)
///     .to_luma();
/// ```
pub struct Raster {
    image: DynamicImage,
}

impl Raster {
    // -- Construction ---------------------------------------------------------

    /// Decode encoded bytes (PNG, JPEG, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, CompareError> {
        let image = image::load_from_memory(data).map_err(|err| {
            CompareError::Algorithm(format!("failed to decode image: {}", err))
        })?;
        debug!(width = image.width(), height = image.height(), "Image decoded");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(image),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> u64 {
        self.image.width() as u64 * self.image.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Resize to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        if self.image.width() == width && self.image.height() == height {
            return self;
        }
        let resized = self.image.resize_exact(width, height, FilterType::Triangle);
        Self { image: resized }
    }

    /// Lossless clockwise rotation by a multiple of 90 degrees.
    pub fn rotate(self, turn: QuarterTurn) -> Self {
        let image = match turn {
            QuarterTurn::None => self.image,
            QuarterTurn::Cw90 => self.image.rotate90(),
            QuarterTurn::Cw180 => self.image.rotate180(),
            QuarterTurn::Cw270 => self.image.rotate270(),
        };
        Self { image }
    }

    pub fn grayscale(self) -> Self {
        Self {
            image: self.image.grayscale(),
        }
    }

    /// Median filter with the given radius (radius 1 is a 3x3 window).
    pub fn denoise(self, radius: u32) -> Self {
        let gray = self.image.to_luma8();
        let filtered = median_filter(&gray, radius, radius);
        Self {
            image: DynamicImage::ImageLuma8(filtered),
        }
    }

    // -- Output ---------------------------------------------------------------

    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    pub fn to_rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }
}

/// A white RGB image, used as the blank placeholder bitmap.
pub fn blank_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width.max(1), height.max(1), image::Rgb([255, 255, 255]))
}
