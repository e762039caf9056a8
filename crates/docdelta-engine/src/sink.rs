// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result sinks: where finished comparison results are stored.
//
// Storage failures are fatal for the comparison, so every sink error is
// reported as `CompareError::Storage`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use docdelta_core::{CompareError, ComparisonId, ComparisonResult, Result};
use tracing::{debug, info, instrument};

pub trait ResultSink: Send + Sync {
    /// Persist `result`, returning a locator for where it was stored.
    fn store(&self, result: &ComparisonResult) -> Result<String>;
}

/// Writes each result as pretty-printed JSON to `<dir>/<comparisonId>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Create the sink, creating `dir` if needed.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| CompareError::Storage(format!("create {}: {e}", dir.display())))?;
        info!("result directory ready");
        Ok(Self { dir })
    }

    pub fn path_for(&self, id: &ComparisonId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Read a stored result back.
    pub fn load(&self, id: &ComparisonId) -> Result<ComparisonResult> {
        let path = self.path_for(id);
        let bytes = fs::read(&path)
            .map_err(|e| CompareError::Storage(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CompareError::Storage(format!("parse {}: {e}", path.display())))
    }
}

impl ResultSink for JsonFileSink {
    #[instrument(skip_all, fields(comparison = %result.comparison_id))]
    fn store(&self, result: &ComparisonResult) -> Result<String> {
        let path = self.path_for(&result.comparison_id);
        let json = serde_json::to_vec_pretty(result)
            .map_err(|e| CompareError::Storage(format!("serialize: {e}")))?;
        // Write to a sibling and rename so readers never see a partial file.
        let partial = path.with_extension("json.partial");
        fs::write(&partial, &json)
            .map_err(|e| CompareError::Storage(format!("write {}: {e}", partial.display())))?;
        fs::rename(&partial, &path)
            .map_err(|e| CompareError::Storage(format!("rename to {}: {e}", path.display())))?;
        debug!(bytes = json.len(), "result stored");
        Ok(path.display().to_string())
    }
}

/// Keeps results in memory, keyed by comparison id.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<HashMap<ComparisonId, ComparisonResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ComparisonId) -> Option<ComparisonResult> {
        self.results
            .lock()
            .map(|results| results.get(id).cloned())
            .unwrap_or(None)
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|results| results.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn store(&self, result: &ComparisonResult) -> Result<String> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| CompareError::Storage("memory sink lock poisoned".into()))?;
        results.insert(result.comparison_id, result.clone());
        Ok(format!("memory:{}", result.comparison_id))
    }
}
