// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Severity classification: maps a per-type magnitude in [0, 1] to a level.

use crate::types::{DifferenceType, Severity};

/// Cut points for one difference type. A magnitude at or above a cut point
/// reaches that level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub major: f64,
    pub minor: f64,
}

impl SeverityThresholds {
    const fn new(critical: f64, major: f64, minor: f64) -> Self {
        Self {
            critical,
            major,
            minor,
        }
    }

    /// Used for type names the table does not know.
    pub const DEFAULT: SeverityThresholds = SeverityThresholds::new(0.8, 0.5, 0.2);

    pub fn for_type(kind: DifferenceType) -> Self {
        match kind {
            DifferenceType::Text => Self::new(0.8, 0.4, 0.1),
            DifferenceType::Image => Self::new(0.7, 0.3, 0.1),
            DifferenceType::Font => Self::new(0.9, 0.5, 0.2),
            DifferenceType::Style => Self::new(0.9, 0.6, 0.3),
            DifferenceType::Metadata => Self::new(0.9, 0.7, 0.4),
        }
    }

    pub fn classify(&self, magnitude: f64) -> Severity {
        let m = clamp_magnitude(magnitude);
        if m >= self.critical {
            Severity::Critical
        } else if m >= self.major {
            Severity::Major
        } else if m >= self.minor {
            Severity::Minor
        } else {
            Severity::Info
        }
    }
}

/// Severity of a difference of `kind` with the given magnitude.
pub fn severity(kind: DifferenceType, magnitude: f64) -> Severity {
    SeverityThresholds::for_type(kind).classify(magnitude)
}

/// Same as [`severity`] but keyed by type name; unknown names use the
/// default table.
pub fn severity_for_name(type_name: &str, magnitude: f64) -> Severity {
    DifferenceType::from_name(type_name)
        .map(SeverityThresholds::for_type)
        .unwrap_or(SeverityThresholds::DEFAULT)
        .classify(magnitude)
}

// NaN counts as maximal so a broken score never hides a difference.
fn clamp_magnitude(magnitude: f64) -> f64 {
    if magnitude.is_nan() {
        1.0
    } else {
        magnitude.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn text_table() {
        assert_eq!(severity(DifferenceType::Text, 0.05), Severity::Info);
        assert_eq!(severity(DifferenceType::Text, 0.1), Severity::Minor);
        assert_eq!(severity(DifferenceType::Text, 0.45), Severity::Major);
        assert_eq!(severity(DifferenceType::Text, 0.8), Severity::Critical);
    }

    #[test]
    fn image_is_stricter_than_metadata() {
        assert_eq!(severity(DifferenceType::Image, 0.35), Severity::Major);
        assert_eq!(severity(DifferenceType::Metadata, 0.35), Severity::Info);
    }

    #[test]
    fn unknown_type_uses_default_table() {
        assert_eq!(severity_for_name("annotation", 0.55), Severity::Major);
        assert_eq!(severity_for_name("annotation", 0.1), Severity::Info);
        assert_eq!(severity_for_name("FONT", 0.55), Severity::Major);
    }

    #[test]
    fn out_of_range_and_nan_are_clamped() {
        assert_eq!(severity(DifferenceType::Style, -3.0), Severity::Info);
        assert_eq!(severity(DifferenceType::Style, 7.0), Severity::Critical);
        assert_eq!(severity(DifferenceType::Style, f64::NAN), Severity::Critical);
    }

    proptest! {
        #[test]
        fn severity_is_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0, idx in 0usize..5) {
            let kind = DifferenceType::ALL[idx];
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(severity(kind, lo) <= severity(kind, hi));
        }
    }
}
