use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::tokenizer::StopWords;

/// Job id or candidate id. The index references it, it does not own it.
pub type DocId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Job,
    Candidate,
}

impl IndexKind {
    /// Directory under the index root holding this kind's store.
    pub fn dir_name(self) -> &'static str {
        match self {
            IndexKind::Job => "jobs",
            IndexKind::Candidate => "candidates",
        }
    }

    /// Candidate profiles are prose-heavy and drop common verb forms as well.
    pub fn stop_words(self) -> StopWords {
        match self {
            IndexKind::Job => StopWords::Base,
            IndexKind::Candidate => StopWords::Extended,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Job => f.write_str("job"),
            IndexKind::Candidate => f.write_str("candidate"),
        }
    }
}

/// One row of the inverted index: a term's statistics within one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document_id: DocId,
    pub term: String,
    pub term_freq: u32,
    pub doc_length: u32,
    /// Documents containing `term` corpus-wide. Zero until maintained.
    pub doc_freq: u32,
}

/// Term frequencies of one document's composed text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVector {
    terms: BTreeMap<String, u32>,
    doc_length: u32,
}

impl TermVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut vector = Self::new();
        for token in tokens {
            *vector.terms.entry(token.into()).or_insert(0) += 1;
            vector.doc_length += 1;
        }
        vector
    }

    pub fn is_empty(&self) -> bool {
        self.doc_length == 0
    }

    /// Sum of all term frequencies.
    pub fn doc_length(&self) -> u32 {
        self.doc_length
    }

    pub fn unique_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn get(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.terms.iter().map(|(t, f)| (t.as_str(), *f))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.keys().map(String::as_str)
    }
}

/// Corpus-wide counters the scorer needs at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub documents: u64,
    pub total_length: u64,
    /// Terms with a stored `doc_freq`. Lags a deferred batch until the
    /// following recompute.
    pub unique_terms: u64,
}

impl CorpusStats {
    pub fn avg_doc_length(&self) -> f64 {
        if self.documents == 0 {
            return 0.0;
        }
        self.total_length as f64 / self.documents as f64
    }

    /// Nothing to rank against: callers take the unranked path.
    pub fn is_degenerate(&self) -> bool {
        self.documents == 0 || self.total_length == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_length_is_sum_of_frequencies() {
        let v = TermVector::from_tokens(["go", "go", "python", "rust"]);
        assert_eq!(v.doc_length(), 4);
        assert_eq!(v.iter().map(|(_, f)| f).sum::<u32>(), v.doc_length());
        assert_eq!(v.get("go"), Some(2));
        assert_eq!(v.unique_terms(), 3);
    }

    #[test]
    fn empty_stats_are_degenerate() {
        let stats = CorpusStats::default();
        assert!(stats.is_degenerate());
        assert_eq!(stats.avg_doc_length(), 0.0);
        let stats = CorpusStats { documents: 2, total_length: 10, unique_terms: 4 };
        assert!(!stats.is_degenerate());
        assert_eq!(stats.avg_doc_length(), 5.0);
    }
}
