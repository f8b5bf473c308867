//! Weighted content composition.
//!
//! BM25 only sees flat term frequency, so field importance is encoded by
//! repeating a field's text. Fractional weights (1.5x, 2.5x) append the first
//! half of the field, cut at `floor(chars / 2)` of the already processed
//! string. These weights decide index parity and must not drift.

use lazy_static::lazy_static;
use regex::Regex;

use crate::index::{DocId, IndexKind};
use crate::model::{CandidateRecord, JobRecord};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid regex");
}

/// An entity that can be turned into an index document.
pub trait Indexable {
    const KIND: IndexKind;

    fn document_id(&self) -> DocId;

    /// Re-checked on every mutation; ineligible documents are removed.
    fn is_eligible(&self) -> bool;

    fn weighted_text(&self) -> String;
}

impl Indexable for JobRecord {
    const KIND: IndexKind = IndexKind::Job;

    fn document_id(&self) -> DocId {
        self.id
    }

    fn is_eligible(&self) -> bool {
        self.is_active()
    }

    fn weighted_text(&self) -> String {
        compose_job(self)
    }
}

impl Indexable for CandidateRecord {
    const KIND: IndexKind = IndexKind::Candidate;

    fn document_id(&self) -> DocId {
        self.id
    }

    fn is_eligible(&self) -> bool {
        self.is_searchable()
    }

    fn weighted_text(&self) -> String {
        compose_candidate(self)
    }
}

/// Remove HTML tags, keeping the text between them.
pub fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// First `floor(n / 2)` characters of `text`.
pub fn first_half(text: &str) -> &str {
    let half = text.chars().count() / 2;
    match text.char_indices().nth(half) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

#[derive(Default)]
struct Fragments {
    parts: Vec<String>,
}

impl Fragments {
    fn repeat(&mut self, text: &str, times: usize) {
        if text.trim().is_empty() {
            return;
        }
        for _ in 0..times {
            self.parts.push(text.to_string());
        }
    }

    /// `times` full copies followed by the first half.
    fn repeat_with_half(&mut self, text: &str, times: usize) {
        if text.trim().is_empty() {
            return;
        }
        self.repeat(text, times);
        self.parts.push(first_half(text).to_string());
    }

    fn into_text(self) -> String {
        self.parts.join(" ")
    }
}

/// Job as an index document: title 3x, skills 2x, category 1.5x, description 1x.
pub fn compose_job(job: &JobRecord) -> String {
    let mut out = Fragments::default();
    out.repeat(&job.title, 3);
    for skill in &job.skills {
        out.repeat(skill, 2);
    }
    if let Some(category) = &job.category {
        out.repeat_with_half(&category.name, 1);
    }
    out.repeat(&strip_tags(&job.description), 1);
    out.into_text()
}

/// Candidate as an index document: skills 3x, title 2.5x, responsibilities
/// 2x, designations 2x, bio 1.5x, degrees 1x, profession 1x.
pub fn compose_candidate(candidate: &CandidateRecord) -> String {
    let mut out = Fragments::default();
    for skill in &candidate.skills {
        out.repeat(skill, 3);
    }
    if let Some(title) = &candidate.title {
        out.repeat_with_half(title, 2);
    }
    for experience in &candidate.experiences {
        if let Some(responsibilities) = &experience.responsibilities {
            out.repeat(&strip_tags(responsibilities), 2);
        }
    }
    for experience in &candidate.experiences {
        if let Some(designation) = &experience.designation {
            out.repeat(designation, 2);
        }
    }
    if let Some(bio) = &candidate.bio {
        out.repeat_with_half(bio, 1);
    }
    for education in &candidate.educations {
        if let Some(degree) = &education.degree {
            out.repeat(degree, 1);
        }
    }
    if let Some(profession) = &candidate.profession {
        out.repeat(profession, 1);
    }
    out.into_text()
}

/// Job as a query against the candidate index: title 3x, description 2x,
/// skills, category and role 1.5x each.
pub fn compose_job_query(job: &JobRecord) -> String {
    let mut out = Fragments::default();
    out.repeat(&job.title, 3);
    out.repeat(&strip_tags(&job.description), 2);
    for skill in &job.skills {
        out.repeat_with_half(skill, 1);
    }
    if let Some(category) = &job.category {
        out.repeat_with_half(&category.name, 1);
    }
    if let Some(role) = &job.role {
        out.repeat_with_half(role, 1);
    }
    out.into_text()
}
