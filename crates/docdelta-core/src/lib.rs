// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docdelta-core: core types, errors, configuration and severity classification
// shared across all crates.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod severity;
pub mod types;

pub use artifacts::{Color, EmbeddedImage, FontDecodeStatus, PageFont, TextRun};
pub use config::{ComparisonOptions, EngineConfig, TextComparisonMethod};
pub use error::{CompareError, ErrorClass, Result};
pub use severity::{SeverityThresholds, severity, severity_for_name};
pub use types::*;
