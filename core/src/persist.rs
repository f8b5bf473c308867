use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::INDEX_FORMAT_VERSION;
use crate::error::{RankError, Result};
use crate::index::{CorpusStats, DocId, IndexEntry, IndexKind, TermVector};
use crate::maintainer::RebuildReport;
use crate::store::{membership_changes, BatchOutcome, DocFreqMode, IndexBatch, IndexOp, IndexStore};

const DOCUMENTS: &[u8] = b"documents";
const TOTAL_LENGTH: &[u8] = b"total_length";
const UNIQUE_TERMS: &[u8] = b"unique_terms";

/// Sidecar written next to an index after each rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub kind: IndexKind,
    /// RFC 3339, UTC.
    pub built_at: String,
    pub version: u32,
    pub documents: u64,
    pub unique_terms: u64,
    pub avg_doc_length: f64,
}

impl MetaFile {
    /// `documents` comes from the store: an incremental rebuild keeps
    /// documents the report never saw.
    pub fn for_rebuild(report: &RebuildReport, documents: u64) -> Self {
        Self {
            kind: report.kind,
            built_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            version: INDEX_FORMAT_VERSION,
            documents,
            unique_terms: report.unique_terms,
            avg_doc_length: report.avg_doc_length,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// Sled database directory for one index.
    pub fn store(&self, kind: IndexKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn meta(&self, kind: IndexKind) -> PathBuf {
        self.root.join(format!("{}.meta.json", kind.dir_name()))
    }
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let path = paths.meta(meta.kind);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, meta)?;
    writer.flush()?;
    tracing::debug!(kind = %meta.kind, path = %path.display(), documents = meta.documents, "rebuild metadata written");
    Ok(())
}

/// `None` until the index has been rebuilt once.
pub fn load_meta(paths: &IndexPaths, kind: IndexKind) -> Result<Option<MetaFile>> {
    let path = paths.meta(kind);
    if !path.is_file() {
        tracing::debug!(%kind, path = %path.display(), "no rebuild metadata");
        return Ok(None);
    }
    let meta = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
    Ok(Some(meta))
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPosting {
    term_freq: u32,
    doc_length: u32,
}

/// `term ++ 0x00 ++ document_id (BE)`. Terms are `[a-z0-9_]`, so the separator
/// never occurs inside one and a term's postings form one contiguous range.
fn posting_key(term: &str, document_id: DocId) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 9);
    key.extend_from_slice(term.as_bytes());
    key.push(0);
    key.extend_from_slice(&document_id.to_be_bytes());
    key
}

fn posting_prefix(term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 1);
    key.extend_from_slice(term.as_bytes());
    key.push(0);
    key
}

fn split_posting_key(key: &[u8]) -> Option<(&[u8], DocId)> {
    if key.len() < 9 {
        return None;
    }
    let (term, rest) = key.split_at(key.len() - 9);
    let id: [u8; 8] = rest[1..].try_into().ok()?;
    Some((term, DocId::from_be_bytes(id)))
}

fn decode_u64(bytes: Option<sled::IVec>) -> u64 {
    bytes
        .and_then(|b| <[u8; 8]>::try_from(b.as_ref()).ok())
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

fn decode_u32(bytes: Option<sled::IVec>) -> u32 {
    bytes
        .and_then(|b| <[u8; 4]>::try_from(b.as_ref()).ok())
        .map(u32::from_be_bytes)
        .unwrap_or(0)
}

fn abort<E: Into<RankError>>(e: E) -> ConflictableTransactionError<RankError> {
    ConflictableTransactionError::Abort(e.into())
}

/// Inverted index persisted in a sled database.
///
/// Trees: `postings` (term/document → tf and length), `documents` (forward
/// index used to find a document's old terms), `doc_freq` (term → count) and
/// `counters` (document count, total length, and the number of `doc_freq`
/// rows, which a deferred batch leaves stale until the next recompute).
pub struct SledStore {
    db: sled::Db,
    postings: sled::Tree,
    documents: sled::Tree,
    doc_freq: sled::Tree,
    counters: sled::Tree,
}

impl SledStore {
    pub fn open(paths: &IndexPaths, kind: IndexKind) -> Result<Self> {
        let dir = paths.store(kind);
        create_dir_all(&dir)?;
        Self::from_db(sled::open(&dir)?)
    }

    /// Throwaway database, removed on drop.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            postings: db.open_tree("postings")?,
            documents: db.open_tree("documents")?,
            doc_freq: db.open_tree("doc_freq")?,
            counters: db.open_tree("counters")?,
            db,
        })
    }

    fn read_vector(&self, document_id: DocId) -> Result<Option<TermVector>> {
        match self.documents.get(document_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn apply_in_transaction(
    batch: &IndexBatch,
    postings: &TransactionalTree,
    documents: &TransactionalTree,
    doc_freq: &TransactionalTree,
    counters: &TransactionalTree,
) -> std::result::Result<BatchOutcome, ConflictableTransactionError<RankError>> {
    let mut outcome = BatchOutcome::default();
    let mut deltas: BTreeMap<String, i64> = BTreeMap::new();
    let mut doc_count = decode_u64(counters.get(DOCUMENTS)?);
    let mut total_length = decode_u64(counters.get(TOTAL_LENGTH)?);
    let mut unique_terms = decode_u64(counters.get(UNIQUE_TERMS)?);

    for op in &batch.ops {
        let document_id = op.document_id();
        let doc_key = document_id.to_be_bytes();
        let previous: Option<TermVector> = match documents.remove(&doc_key[..])? {
            Some(bytes) => Some(bincode::deserialize(&bytes).map_err(abort)?),
            None => None,
        };
        if let Some(prev) = &previous {
            for term in prev.terms() {
                postings.remove(posting_key(term, document_id))?;
            }
            doc_count = doc_count.saturating_sub(1);
            total_length = total_length.saturating_sub(prev.doc_length() as u64);
        }

        let next = match op {
            IndexOp::Replace { vector, .. } if !vector.is_empty() => Some(vector),
            _ => None,
        };
        if let Some(vector) = next {
            for (term, term_freq) in vector.iter() {
                let value = StoredPosting { term_freq, doc_length: vector.doc_length() };
                postings.insert(posting_key(term, document_id), bincode::serialize(&value).map_err(abort)?)?;
            }
            documents.insert(&doc_key[..], bincode::serialize(vector).map_err(abort)?)?;
            doc_count += 1;
            total_length += vector.doc_length() as u64;
            outcome.replaced += 1;
        } else if previous.is_some() {
            outcome.removed += 1;
        }

        for (term, delta) in membership_changes(previous.as_ref(), next) {
            *deltas.entry(term).or_insert(0) += delta;
        }
    }

    outcome.dirty_terms = deltas.values().filter(|d| **d != 0).count();
    if batch.mode == DocFreqMode::Incremental {
        for (term, delta) in deltas.into_iter().filter(|(_, d)| *d != 0) {
            let current = decode_u32(doc_freq.get(term.as_bytes())?) as i64;
            let updated = (current + delta).max(0) as u32;
            match (current, updated) {
                (0, n) if n > 0 => unique_terms += 1,
                (c, 0) if c > 0 => unique_terms = unique_terms.saturating_sub(1),
                _ => {}
            }
            if updated == 0 {
                doc_freq.remove(term.as_bytes())?;
            } else {
                doc_freq.insert(term.as_bytes(), &updated.to_be_bytes()[..])?;
            }
        }
    }

    counters.insert(DOCUMENTS, &doc_count.to_be_bytes()[..])?;
    counters.insert(TOTAL_LENGTH, &total_length.to_be_bytes()[..])?;
    counters.insert(UNIQUE_TERMS, &unique_terms.to_be_bytes()[..])?;
    Ok(outcome)
}

impl IndexStore for SledStore {
    fn apply(&self, batch: IndexBatch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let result: std::result::Result<BatchOutcome, TransactionError<RankError>> =
            (&self.postings, &self.documents, &self.doc_freq, &self.counters).transaction(
                |(postings, documents, doc_freq, counters)| {
                    apply_in_transaction(&batch, postings, documents, doc_freq, counters)
                },
            );
        match result {
            Ok(outcome) => Ok(outcome),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(RankError::Storage(e)),
        }
    }

    fn recompute_doc_frequencies(&self) -> Result<usize> {
        let mut counts: Vec<(Vec<u8>, u32)> = Vec::new();
        for item in self.postings.iter().keys() {
            let key = item?;
            let Some((term, _)) = split_posting_key(&key) else { continue };
            match counts.last_mut() {
                Some((last, n)) if last.as_slice() == term => *n += 1,
                _ => counts.push((term.to_vec(), 1)),
            }
        }

        let mut batch = sled::Batch::default();
        for key in self.doc_freq.iter().keys() {
            batch.remove(key?);
        }
        for (term, n) in &counts {
            batch.insert(term.as_slice(), &n.to_be_bytes()[..]);
        }
        self.doc_freq.apply_batch(batch)?;
        self.counters.insert(UNIQUE_TERMS, &(counts.len() as u64).to_be_bytes()[..])?;
        tracing::debug!(terms = counts.len(), "recomputed document frequencies");
        Ok(counts.len())
    }

    fn clear(&self) -> Result<()> {
        self.postings.clear()?;
        self.documents.clear()?;
        self.doc_freq.clear()?;
        self.counters.clear()?;
        Ok(())
    }

    fn postings(&self, term: &str) -> Result<Vec<IndexEntry>> {
        let doc_freq = self.doc_freq(term)?;
        let mut entries = Vec::new();
        for item in self.postings.scan_prefix(posting_prefix(term)) {
            let (key, value) = item?;
            let Some((_, document_id)) = split_posting_key(&key) else { continue };
            let stored: StoredPosting = bincode::deserialize(&value)?;
            entries.push(IndexEntry {
                document_id,
                term: term.to_string(),
                term_freq: stored.term_freq,
                doc_length: stored.doc_length,
                doc_freq,
            });
        }
        Ok(entries)
    }

    fn document_entries(&self, document_id: DocId) -> Result<Vec<IndexEntry>> {
        let Some(vector) = self.read_vector(document_id)? else { return Ok(Vec::new()) };
        vector
            .iter()
            .map(|(term, term_freq)| {
                Ok(IndexEntry {
                    document_id,
                    term: term.to_string(),
                    term_freq,
                    doc_length: vector.doc_length(),
                    doc_freq: self.doc_freq(term)?,
                })
            })
            .collect()
    }

    fn doc_freq(&self, term: &str) -> Result<u32> {
        Ok(decode_u32(self.doc_freq.get(term.as_bytes())?))
    }

    fn contains(&self, document_id: DocId) -> Result<bool> {
        Ok(self.documents.contains_key(document_id.to_be_bytes())?)
    }

    fn stats(&self) -> Result<CorpusStats> {
        Ok(CorpusStats {
            documents: decode_u64(self.counters.get(DOCUMENTS)?),
            total_length: decode_u64(self.counters.get(TOTAL_LENGTH)?),
            unique_terms: decode_u64(self.counters.get(UNIQUE_TERMS)?),
        })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
