//! Keeps one inverted index in step with its source entities.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::compose::Indexable;
use crate::config::REBUILD_PROGRESS_EVERY;
use crate::error::{RankError, Result};
use crate::index::{DocId, IndexKind, TermVector};
use crate::store::{IndexBatch, IndexStore};
use crate::tokenizer::Tokenizer;

/// Who asked for the reindex decides how loudly empty content fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Operator-invoked: empty content drops any old entries and is a
    /// [`RankError::NoContent`].
    Explicit,
    /// Lifecycle event: empty content is logged and skipped.
    EventDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { doc_length: u32 },
    /// Not eligible; any entries it had are gone.
    Removed,
    /// Eligible but nothing to index; any entries it had are gone.
    NoContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub document_id: DocId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RebuildProgress {
    pub processed: usize,
    pub indexed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub kind: IndexKind,
    pub fresh: bool,
    pub processed: usize,
    pub indexed: usize,
    /// Ineligible documents whose entries were dropped.
    pub removed: usize,
    pub skipped: Vec<SkippedDocument>,
    pub unique_terms: u64,
    pub avg_doc_length: f64,
    pub elapsed_ms: u128,
}

enum Planned {
    Index(TermVector),
    Ineligible,
    Empty,
}

pub struct IndexMaintainer {
    kind: IndexKind,
    store: Arc<dyn IndexStore>,
    tokenizer: Tokenizer,
    // Serializes maintenance writes; readers never take it.
    write_lock: Mutex<()>,
}

impl IndexMaintainer {
    pub fn new(kind: IndexKind, store: Arc<dyn IndexStore>) -> Self {
        Self::with_tokenizer(kind, store, Tokenizer::new(kind.stop_words()))
    }

    pub fn with_tokenizer(kind: IndexKind, store: Arc<dyn IndexStore>, tokenizer: Tokenizer) -> Self {
        Self { kind, store, tokenizer, write_lock: Mutex::new(()) }
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn term_vector<R: Indexable>(&self, record: &R) -> TermVector {
        TermVector::from_tokens(self.tokenizer.tokenize(&record.weighted_text()))
    }

    /// Bring one document's entries in line with `record`.
    pub fn index<R: Indexable>(&self, record: &R, mode: Mode) -> Result<IndexOutcome> {
        let document_id = record.document_id();
        if !record.is_eligible() {
            let removed = self.remove(document_id)?;
            tracing::debug!(kind = %self.kind, document_id, removed, "not eligible, dropped from index");
            return Ok(IndexOutcome::Removed);
        }

        let vector = self.term_vector(record);
        if vector.is_empty() {
            self.remove(document_id)?;
            return match mode {
                Mode::Explicit => Err(RankError::NoContent { kind: self.kind, document_id }),
                Mode::EventDriven => {
                    tracing::info!(kind = %self.kind, document_id, "no indexable content, skipped");
                    Ok(IndexOutcome::NoContent)
                }
            };
        }

        let doc_length = vector.doc_length();
        let _guard = self.write_lock.lock();
        let outcome = self.store.apply(IndexBatch::incremental().replace(document_id, vector))?;
        tracing::debug!(kind = %self.kind, document_id, doc_length, dirty_terms = outcome.dirty_terms, "indexed");
        Ok(IndexOutcome::Indexed { doc_length })
    }

    /// Drop every entry of `document_id`. Returns whether it had any.
    pub fn remove(&self, document_id: DocId) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let outcome = self.store.apply(IndexBatch::incremental().remove(document_id))?;
        Ok(outcome.removed > 0)
    }

    /// Full recount of document frequencies.
    pub fn recompute(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        self.store.recompute_doc_frequencies()
    }

    /// Reindex every record, one short write per document, and recount
    /// document frequencies once at the end. A failing document is recorded
    /// as skipped and the rebuild continues.
    pub fn rebuild<R, I, F>(&self, records: I, fresh: bool, mut progress: F) -> Result<RebuildReport>
    where
        R: Indexable,
        I: IntoIterator<Item = R>,
        F: FnMut(&RebuildProgress),
    {
        let started = Instant::now();
        if fresh {
            let _guard = self.write_lock.lock();
            self.store.clear()?;
            tracing::info!(kind = %self.kind, "cleared existing index");
        }

        let mut processed = 0;
        let mut indexed = 0;
        let mut removed = 0;
        let mut skipped = Vec::new();

        for record in records {
            processed += 1;
            let document_id = record.document_id();
            let planned = if !record.is_eligible() {
                Planned::Ineligible
            } else {
                let vector = self.term_vector(&record);
                if vector.is_empty() { Planned::Empty } else { Planned::Index(vector) }
            };

            let batch = match &planned {
                Planned::Index(vector) => IndexBatch::deferred().replace(document_id, vector.clone()),
                Planned::Ineligible | Planned::Empty => IndexBatch::deferred().remove(document_id),
            };
            let result = {
                let _guard = self.write_lock.lock();
                self.store.apply(batch)
            };

            match (result, planned) {
                (Err(err), _) => {
                    tracing::error!(kind = %self.kind, document_id, error = %err, "failed to index document");
                    skipped.push(SkippedDocument { document_id, reason: err.to_string() });
                }
                (Ok(_), Planned::Index(_)) => indexed += 1,
                (Ok(_), Planned::Ineligible) => removed += 1,
                (Ok(_), Planned::Empty) => {
                    let err = RankError::NoContent { kind: self.kind, document_id };
                    tracing::warn!(kind = %self.kind, document_id, "{err}");
                    skipped.push(SkippedDocument { document_id, reason: err.to_string() });
                }
            }

            if processed % REBUILD_PROGRESS_EVERY == 0 {
                tracing::info!(kind = %self.kind, processed, indexed, skipped = skipped.len(), "rebuild progress");
            }
            progress(&RebuildProgress { processed, indexed, skipped: skipped.len() });
        }

        let unique_terms = self.recompute()?;
        self.store.flush()?;
        let stats = self.store.stats()?;
        tracing::info!(
            kind = %self.kind,
            processed,
            indexed,
            removed,
            skipped = skipped.len(),
            unique_terms,
            "rebuild complete"
        );

        Ok(RebuildReport {
            kind: self.kind,
            fresh,
            processed,
            indexed,
            removed,
            skipped,
            unique_terms: unique_terms as u64,
            avg_doc_length: stats.avg_doc_length(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateRecord, JobRecord, JobStatus};
    use crate::store::MemoryStore;
    use time::macros::date;

    fn candidate(id: DocId, skills: &[&str]) -> CandidateRecord {
        CandidateRecord {
            id,
            title: None,
            bio: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experiences: vec![],
            educations: vec![],
            profession: None,
            address: None,
            phone: None,
            email: None,
            profile_complete: true,
            visibility: true,
        }
    }

    fn job(id: DocId, title: &str, status: JobStatus) -> JobRecord {
        JobRecord {
            id,
            company_id: 1,
            title: title.into(),
            description: String::new(),
            skills: vec![],
            category: None,
            role: None,
            tags: vec![],
            company_name: None,
            country_id: None,
            state_id: None,
            city_id: None,
            job_type: None,
            experience_id: None,
            min_salary: None,
            max_salary: None,
            status,
            deadline: date!(2026 - 12 - 31),
        }
    }

    fn maintainer(kind: IndexKind) -> IndexMaintainer {
        IndexMaintainer::new(kind, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn indexes_composed_terms() {
        let m = maintainer(IndexKind::Candidate);
        let outcome = m.index(&candidate(1, &["Rust"]), Mode::Explicit).unwrap();
        assert_eq!(outcome, IndexOutcome::Indexed { doc_length: 3 });
        let entries = m.store().document_entries(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].term, "rust");
        assert_eq!(entries[0].term_freq, 3);
    }

    #[test]
    fn empty_content_depends_on_mode() {
        let m = maintainer(IndexKind::Candidate);
        // Only stop words and one-letter tokens.
        let hollow = candidate(4, &["the", "a"]);
        assert!(matches!(m.index(&hollow, Mode::Explicit), Err(RankError::NoContent { document_id: 4, .. })));
        assert_eq!(m.index(&hollow, Mode::EventDriven).unwrap(), IndexOutcome::NoContent);
    }

    #[test]
    fn losing_eligibility_removes_every_entry() {
        let m = maintainer(IndexKind::Candidate);
        let mut c = candidate(1, &["Go", "Kubernetes"]);
        m.index(&c, Mode::EventDriven).unwrap();
        assert!(m.store().contains(1).unwrap());

        c.visibility = false;
        assert_eq!(m.index(&c, Mode::EventDriven).unwrap(), IndexOutcome::Removed);
        assert!(m.store().document_entries(1).unwrap().is_empty());
        assert_eq!(m.store().doc_freq("go").unwrap(), 0);
        assert_eq!(m.store().stats().unwrap().documents, 0);
    }

    #[test]
    fn stale_entries_go_when_content_empties() {
        let m = maintainer(IndexKind::Candidate);
        m.index(&candidate(2, &["Go"]), Mode::EventDriven).unwrap();
        m.index(&candidate(2, &[]), Mode::EventDriven).unwrap();
        assert!(!m.store().contains(2).unwrap());
    }

    #[test]
    fn explicit_reindex_of_empty_content_still_drops_old_entries() {
        let m = maintainer(IndexKind::Job);
        m.index(&job(7, "Laravel Developer", JobStatus::Active), Mode::Explicit).unwrap();
        let result = m.index(&job(7, "a", JobStatus::Active), Mode::Explicit);
        assert!(matches!(result, Err(RankError::NoContent { document_id: 7, .. })));
        assert!(!m.store().contains(7).unwrap());
        assert_eq!(m.store().doc_freq("laravel").unwrap(), 0);
        assert_eq!(m.store().stats().unwrap().documents, 0);
    }

    #[test]
    fn rebuild_reports_each_outcome() {
        let m = maintainer(IndexKind::Job);
        let jobs = vec![
            job(1, "Laravel Developer", JobStatus::Active),
            job(2, "React Developer", JobStatus::Active),
            job(3, "Closed Role", JobStatus::Closed),
            job(4, "a", JobStatus::Active),
        ];
        let mut calls = 0;
        let report = m.rebuild(jobs, true, |_| calls += 1).unwrap();

        assert_eq!(calls, 4);
        assert_eq!(report.processed, 4);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].document_id, 4);
        assert_eq!(report.unique_terms, 3);
        assert_eq!(report.avg_doc_length, 6.0);
        assert_eq!(m.store().doc_freq("developer").unwrap(), 2);
    }

    #[test]
    fn fresh_rebuild_drops_documents_not_in_the_input() {
        let m = maintainer(IndexKind::Job);
        m.index(&job(9, "Old Posting", JobStatus::Active), Mode::Explicit).unwrap();
        m.rebuild(vec![job(1, "Developer", JobStatus::Active)], true, |_| {}).unwrap();
        assert!(!m.store().contains(9).unwrap());

        m.index(&job(9, "Old Posting", JobStatus::Active), Mode::Explicit).unwrap();
        m.rebuild(vec![job(1, "Developer", JobStatus::Active)], false, |_| {}).unwrap();
        assert!(m.store().contains(9).unwrap());
    }
}
