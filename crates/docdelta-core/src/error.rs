// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docdelta.

use thiserror::Error;

use crate::types::ComparisonStatus;

/// Top-level error type for all docdelta operations.
#[derive(Debug, Error)]
pub enum CompareError {
    // -- Per-page errors (recoverable) --
    #[error("page extraction failed: {0}")]
    Extraction(String),

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("page processing exceeded the deadline of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("comparison algorithm failed: {0}")]
    Algorithm(String),

    // -- Document / storage errors (fatal) --
    #[error("document could not be loaded: {0}")]
    DocumentLoad(String),

    #[error("result storage unavailable: {0}")]
    Storage(String),

    // -- Lifecycle / configuration --
    #[error("illegal status transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ComparisonStatus,
        to: ComparisonStatus,
    },

    #[error("invalid option {key}: {value}")]
    InvalidOption { key: String, value: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether an error may be absorbed locally or must fail the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Absorbed with a placeholder or a conservative score.
    Recoverable,
    /// Propagates up and moves the comparison to FAILED.
    Fatal,
}

impl CompareError {
    /// Classify this error for the orchestrator's propagation policy.
    ///
    /// Only document-load and storage failures (including the I/O and
    /// serialization errors raised while writing results) are fatal.
    pub fn class(&self) -> ErrorClass {
        match self {
            CompareError::Extraction(_)
            | CompareError::Render(_)
            | CompareError::Timeout { .. }
            | CompareError::Algorithm(_)
            | CompareError::InvalidOption { .. } => ErrorClass::Recoverable,

            CompareError::DocumentLoad(_)
            | CompareError::Storage(_)
            | CompareError::InvalidTransition { .. }
            | CompareError::Io(_)
            | CompareError::Serialization(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CompareError>;
