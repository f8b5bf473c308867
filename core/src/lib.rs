//! BM25 relevance ranking for a job board.
//!
//! Two symmetric pipelines share this crate: jobs are indexed and searched
//! with free-text queries, candidates are indexed and ranked against the
//! requirements of a job they applied to.

pub mod bm25;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod maintainer;
pub mod model;
pub mod page;
pub mod persist;
pub mod ranking;
pub mod search;
pub mod source;
pub mod store;
pub mod tokenizer;

pub use bm25::{Bm25Params, Bm25Scorer, ScoredDocument};
pub use error::{RankError, Result};
pub use index::{CorpusStats, DocId, IndexEntry, IndexKind, TermVector};
pub use maintainer::{IndexMaintainer, Mode, RebuildReport};
pub use store::{IndexStore, MemoryStore};
