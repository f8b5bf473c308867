//! BM25 Okapi scoring over an [`IndexStore`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::config::{DEFAULT_B, DEFAULT_K1};
use crate::error::Result;
use crate::index::DocId;
use crate::store::IndexStore;

/// Tunable BM25 constants. Corpus characteristics vary between deployments,
/// so neither is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    k1: f64,
    b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

impl Bm25Params {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    /// Term frequency saturation.
    pub fn k1(&self) -> f64 {
        self.k1
    }

    /// Length normalization strength, 0 (none) to 1 (full).
    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn set_k1(&mut self, k1: f64) {
        self.k1 = k1;
    }

    pub fn set_b(&mut self, b: f64) {
        self.b = b;
    }

    pub fn with_overrides(mut self, k1: Option<f64>, b: Option<f64>) -> Self {
        if let Some(k1) = k1 {
            self.k1 = k1;
        }
        if let Some(b) = b {
            self.b = b;
        }
        self
    }
}

/// `ln((N - df + 0.5) / (df + 0.5) + 1)`. Positive while `df <= N`, so `N`
/// must count the corpus `doc_freq` was counted over.
pub fn idf(doc_freq: u32, total_docs: u64) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturated, length-normalized term frequency.
pub fn tf_weight(term_freq: u32, doc_length: u32, avg_doc_length: f64, params: &Bm25Params) -> f64 {
    let tf = term_freq as f64;
    let norm = 1.0 - params.b + params.b * (doc_length as f64 / avg_doc_length);
    let denom = tf + params.k1 * norm;
    if denom <= 0.0 {
        return 0.0;
    }
    tf * (params.k1 + 1.0) / denom
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document_id: DocId,
    pub score: f64,
}

/// Scores descending, ties by document id ascending.
pub fn rank(scores: HashMap<DocId, f64>) -> Vec<ScoredDocument> {
    let mut ranked: Vec<ScoredDocument> =
        scores.into_iter().map(|(document_id, score)| ScoredDocument { document_id, score }).collect();
    ranked.sort_by(by_score_then_id);
    ranked
}

pub(crate) fn by_score_then_id(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score.total_cmp(&a.score).then(a.document_id.cmp(&b.document_id))
}

#[derive(Debug, Clone, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Bm25Params {
        &mut self.params
    }

    /// Accumulate per-document scores for `query_terms`.
    ///
    /// Query terms form a sequence: a term repeated in the query contributes
    /// once per occurrence. Terms missing from the index contribute nothing.
    /// Callers check [`CorpusStats::is_degenerate`](crate::index::CorpusStats::is_degenerate)
    /// first; degenerate statistics here yield no scores.
    pub fn score(
        &self,
        store: &dyn IndexStore,
        query_terms: &[String],
        total_docs: u64,
        avg_doc_length: f64,
    ) -> Result<HashMap<DocId, f64>> {
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        if total_docs == 0 || !(avg_doc_length > 0.0) || !avg_doc_length.is_finite() {
            tracing::debug!(total_docs, avg_doc_length, "bm25 skipped: degenerate corpus");
            return Ok(scores);
        }

        let mut multiplicity: BTreeMap<&str, u32> = BTreeMap::new();
        for term in query_terms {
            *multiplicity.entry(term.as_str()).or_insert(0) += 1;
        }

        for (term, occurrences) in multiplicity {
            let postings = store.postings(term)?;
            if postings.is_empty() {
                continue;
            }
            for entry in postings {
                let weight = idf(entry.doc_freq, total_docs)
                    * tf_weight(entry.term_freq, entry.doc_length, avg_doc_length, &self.params);
                if !weight.is_finite() {
                    tracing::warn!(term, document_id = entry.document_id, "non-finite bm25 weight discarded");
                    continue;
                }
                *scores.entry(entry.document_id).or_insert(0.0) += weight * occurrences as f64;
            }
        }
        Ok(scores)
    }
}
