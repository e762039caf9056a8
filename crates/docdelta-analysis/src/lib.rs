// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docdelta-analysis: page alignment and the per-modality differs.
//
// Everything here is synchronous and side-effect free apart from logging.
// The engine crate feeds it extracted page artifacts and collects the
// resulting `PageDetails`.

pub mod align;
pub mod coordinates;
pub mod difference;
pub mod fingerprint;
pub mod font;
pub mod image;
pub mod layout;
pub mod metadata;
pub mod page;
pub mod style;
pub mod text;

pub use align::DocumentAligner;
pub use coordinates::{PagePlacement, default_rect, ensure_rect, normalize, repair_coordinates};
pub use difference::{DifferenceDetail, DifferenceDraft, DisplayCoordinates, PageFrames, SideRects};
pub use fingerprint::PageFingerprint;
pub use font::{FontComparison, FontDiffer, font_info, normalize_font_name};
pub use image::{ImageDiffer, ImageSignature, PerceptualHash, SignedImage};
pub use layout::TextLayout;
pub use page::{PageComparator, PageContent};
pub use style::StyleDiffer;
pub use text::{TextDiffer, TextDifference};
