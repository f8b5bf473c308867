//! Inverted index storage.
//!
//! A store holds one entity type's index. All writes go through [`IndexStore::apply`],
//! which replaces or removes whole documents and, in incremental mode, adjusts
//! `doc_freq` for exactly the terms whose document membership changed, all in
//! one atomic unit.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::Result;
use crate::index::{CorpusStats, DocId, IndexEntry, TermVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFreqMode {
    /// Adjust the dirty terms' document frequencies inside the same write.
    Incremental,
    /// Leave document frequencies alone; a full recompute must follow.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    Replace { document_id: DocId, vector: TermVector },
    Remove { document_id: DocId },
}

impl IndexOp {
    pub fn document_id(&self) -> DocId {
        match self {
            IndexOp::Replace { document_id, .. } | IndexOp::Remove { document_id } => *document_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexBatch {
    pub ops: Vec<IndexOp>,
    pub mode: DocFreqMode,
}

impl IndexBatch {
    pub fn incremental() -> Self {
        Self { ops: Vec::new(), mode: DocFreqMode::Incremental }
    }

    pub fn deferred() -> Self {
        Self { ops: Vec::new(), mode: DocFreqMode::Deferred }
    }

    /// Replacing with an empty vector removes the document.
    pub fn replace(mut self, document_id: DocId, vector: TermVector) -> Self {
        self.ops.push(IndexOp::Replace { document_id, vector });
        self
    }

    pub fn remove(mut self, document_id: DocId) -> Self {
        self.ops.push(IndexOp::Remove { document_id });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub replaced: usize,
    /// Documents that had entries and lost all of them.
    pub removed: usize,
    /// Terms that gained or lost a document.
    pub dirty_terms: usize,
}

/// Terms present in exactly one of the two vectors: the only terms whose
/// document frequency a replace can change.
pub(crate) fn membership_changes(previous: Option<&TermVector>, next: Option<&TermVector>) -> Vec<(String, i64)> {
    let mut changes = Vec::new();
    if let Some(prev) = previous {
        for term in prev.terms() {
            if !next.is_some_and(|n| n.contains(term)) {
                changes.push((term.to_string(), -1));
            }
        }
    }
    if let Some(next) = next {
        for term in next.terms() {
            if !previous.is_some_and(|p| p.contains(term)) {
                changes.push((term.to_string(), 1));
            }
        }
    }
    changes
}

/// Storage engine for one entity type's inverted index.
pub trait IndexStore: Send + Sync {
    /// Apply every op in the batch as one atomic unit.
    fn apply(&self, batch: IndexBatch) -> Result<BatchOutcome>;

    /// Recount `doc_freq` for every term. Returns the number of distinct terms.
    fn recompute_doc_frequencies(&self) -> Result<usize>;

    /// Truncate the whole index.
    fn clear(&self) -> Result<()>;

    /// Entries for `term`, ordered by document id.
    fn postings(&self, term: &str) -> Result<Vec<IndexEntry>>;

    /// Entries for one document, ordered by term.
    fn document_entries(&self, document_id: DocId) -> Result<Vec<IndexEntry>>;

    fn doc_freq(&self, term: &str) -> Result<u32>;

    fn contains(&self, document_id: DocId) -> Result<bool>;

    fn stats(&self) -> Result<CorpusStats>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Delete-then-insert one document with incremental `doc_freq` maintenance.
    fn replace(&self, document_id: DocId, vector: TermVector) -> Result<()> {
        self.apply(IndexBatch::incremental().replace(document_id, vector)).map(|_| ())
    }

    fn remove(&self, document_id: DocId) -> Result<bool> {
        self.apply(IndexBatch::incremental().remove(document_id)).map(|o| o.removed > 0)
    }
}

#[derive(Default)]
struct MemoryIndex {
    postings: HashMap<String, BTreeMap<DocId, u32>>,
    documents: HashMap<DocId, TermVector>,
    doc_freq: HashMap<String, u32>,
    total_length: u64,
}

impl MemoryIndex {
    fn detach(&mut self, document_id: DocId) -> Option<TermVector> {
        let previous = self.documents.remove(&document_id)?;
        for term in previous.terms() {
            if let Some(docs) = self.postings.get_mut(term) {
                docs.remove(&document_id);
                if docs.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_length -= previous.doc_length() as u64;
        Some(previous)
    }

    fn attach(&mut self, document_id: DocId, vector: TermVector) {
        for (term, freq) in vector.iter() {
            self.postings.entry(term.to_string()).or_default().insert(document_id, freq);
        }
        self.total_length += vector.doc_length() as u64;
        self.documents.insert(document_id, vector);
    }

    fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    fn entry(&self, document_id: DocId, term: &str, term_freq: u32) -> IndexEntry {
        let doc_length = self.documents.get(&document_id).map_or(0, TermVector::doc_length);
        IndexEntry {
            document_id,
            term: term.to_string(),
            term_freq,
            doc_length,
            doc_freq: self.doc_freq(term),
        }
    }
}

/// Index held in process memory behind a read-write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for MemoryStore {
    fn apply(&self, batch: IndexBatch) -> Result<BatchOutcome> {
        let mut index = self.inner.write();
        let mut outcome = BatchOutcome::default();
        let mut dirty = BTreeSet::new();

        for op in batch.ops {
            match op {
                IndexOp::Replace { document_id, vector } if !vector.is_empty() => {
                    let previous = index.detach(document_id);
                    dirty.extend(membership_changes(previous.as_ref(), Some(&vector)).into_iter().map(|(t, _)| t));
                    index.attach(document_id, vector);
                    outcome.replaced += 1;
                }
                op => {
                    if let Some(previous) = index.detach(op.document_id()) {
                        dirty.extend(membership_changes(Some(&previous), None).into_iter().map(|(t, _)| t));
                        outcome.removed += 1;
                    }
                }
            }
        }

        outcome.dirty_terms = dirty.len();
        if batch.mode == DocFreqMode::Incremental {
            for term in dirty {
                match index.postings.get(&term).map(BTreeMap::len) {
                    Some(n) => {
                        index.doc_freq.insert(term, n as u32);
                    }
                    None => {
                        index.doc_freq.remove(&term);
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn recompute_doc_frequencies(&self) -> Result<usize> {
        let mut index = self.inner.write();
        let doc_freq: HashMap<String, u32> =
            index.postings.iter().map(|(term, docs)| (term.clone(), docs.len() as u32)).collect();
        index.doc_freq = doc_freq;
        Ok(index.doc_freq.len())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.write() = MemoryIndex::default();
        Ok(())
    }

    fn postings(&self, term: &str) -> Result<Vec<IndexEntry>> {
        let index = self.inner.read();
        Ok(index
            .postings
            .get(term)
            .map(|docs| docs.iter().map(|(&id, &tf)| index.entry(id, term, tf)).collect())
            .unwrap_or_default())
    }

    fn document_entries(&self, document_id: DocId) -> Result<Vec<IndexEntry>> {
        let index = self.inner.read();
        Ok(index
            .documents
            .get(&document_id)
            .map(|v| v.iter().map(|(term, tf)| index.entry(document_id, term, tf)).collect())
            .unwrap_or_default())
    }

    fn doc_freq(&self, term: &str) -> Result<u32> {
        Ok(self.inner.read().doc_freq(term))
    }

    fn contains(&self, document_id: DocId) -> Result<bool> {
        Ok(self.inner.read().documents.contains_key(&document_id))
    }

    fn stats(&self) -> Result<CorpusStats> {
        let index = self.inner.read();
        Ok(CorpusStats {
            documents: index.documents.len() as u64,
            total_length: index.total_length,
            unique_terms: index.doc_freq.len() as u64,
        })
    }
}
