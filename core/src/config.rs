//! Engine configuration.
//!
//! Defaults live here as constants; operators override them with a JSON
//! config file or per-invocation CLI flags and query parameters.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bm25::Bm25Params;
use crate::error::Result;

/// Standard BM25 term frequency saturation.
pub const DEFAULT_K1: f64 = 1.2;

/// Standard BM25 length normalization strength.
pub const DEFAULT_B: f64 = 0.75;

/// Jobs per page in search results.
pub const DEFAULT_JOB_PAGE_SIZE: usize = 8;

/// Applicants per page in ranked applicant lists.
pub const DEFAULT_CANDIDATE_PAGE_SIZE: usize = 10;

/// Bumped when the on-disk index layout changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Rebuild progress is logged every this many documents.
pub const REBUILD_PROGRESS_EVERY: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub job_page_size: usize,
    pub candidate_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            job_page_size: DEFAULT_JOB_PAGE_SIZE,
            candidate_page_size: DEFAULT_CANDIDATE_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_bm25_overrides(mut self, k1: Option<f64>, b: Option<f64>) -> Self {
        self.bm25 = self.bm25.with_overrides(k1, b);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"bm25": {"k1": 2.0, "b": 0.5}}"#).unwrap();
        assert_eq!(config.bm25.k1(), 2.0);
        assert_eq!(config.bm25.b(), 0.5);
        assert_eq!(config.job_page_size, DEFAULT_JOB_PAGE_SIZE);
        assert_eq!(config.candidate_page_size, DEFAULT_CANDIDATE_PAGE_SIZE);
    }

    #[test]
    fn overrides_apply_per_invocation() {
        let config = EngineConfig::default().with_bm25_overrides(None, Some(0.0));
        assert_eq!(config.bm25.k1(), DEFAULT_K1);
        assert_eq!(config.bm25.b(), 0.0);
    }
}
