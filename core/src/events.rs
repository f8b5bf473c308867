//! Typed lifecycle events and the table that routes them to index handlers.
//!
//! Every mutation the job board makes to an indexed entity, or to a
//! sub-entity that feeds a composed document, arrives as one [`IndexEvent`].
//! The [`IndexListener`] reindexes synchronously and never fails the
//! mutation that produced the event: maintenance errors are logged.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::CandidateDirectory;
use crate::error::Result;
use crate::index::DocId;
use crate::maintainer::{IndexMaintainer, IndexOutcome, Mode};
use crate::model::{Application, CandidateRecord, Education, Experience, JobRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IndexEvent {
    JobCreated { job: JobRecord },
    JobUpdated { job: JobRecord },
    JobDeleted { job_id: DocId },
    CandidateCreated { candidate: CandidateRecord },
    CandidateUpdated { candidate: CandidateRecord },
    CandidateDeleted { candidate_id: DocId },
    CandidateSkillCreated { candidate_id: DocId, skill: String },
    CandidateSkillDeleted { candidate_id: DocId, skill: String },
    CandidateExperienceCreated { candidate_id: DocId, experience: Experience },
    CandidateExperienceUpdated { candidate_id: DocId, experience: Experience },
    CandidateExperienceDeleted { candidate_id: DocId, experience_id: u64 },
    CandidateEducationCreated { candidate_id: DocId, education: Education },
    CandidateEducationUpdated { candidate_id: DocId, education: Education },
    CandidateEducationDeleted { candidate_id: DocId, education_id: u64 },
    ApplicationCreated { application: Application },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Job,
    Candidate,
    CandidateSkill,
    CandidateExperience,
    CandidateEducation,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    IndexJob,
    RemoveJob,
    IndexCandidate,
    RemoveCandidate,
    /// A sub-entity changed; recompose the owning candidate from the directory.
    ReindexCandidate,
    Ignore,
}

const DISPATCH: &[(Entity, Lifecycle, Handler)] = &[
    (Entity::Job, Lifecycle::Created, Handler::IndexJob),
    (Entity::Job, Lifecycle::Updated, Handler::IndexJob),
    (Entity::Job, Lifecycle::Deleted, Handler::RemoveJob),
    (Entity::Candidate, Lifecycle::Created, Handler::IndexCandidate),
    (Entity::Candidate, Lifecycle::Updated, Handler::IndexCandidate),
    (Entity::Candidate, Lifecycle::Deleted, Handler::RemoveCandidate),
    (Entity::CandidateSkill, Lifecycle::Created, Handler::ReindexCandidate),
    (Entity::CandidateSkill, Lifecycle::Deleted, Handler::ReindexCandidate),
    (Entity::CandidateExperience, Lifecycle::Created, Handler::ReindexCandidate),
    (Entity::CandidateExperience, Lifecycle::Updated, Handler::ReindexCandidate),
    (Entity::CandidateExperience, Lifecycle::Deleted, Handler::ReindexCandidate),
    (Entity::CandidateEducation, Lifecycle::Created, Handler::ReindexCandidate),
    (Entity::CandidateEducation, Lifecycle::Updated, Handler::ReindexCandidate),
    (Entity::CandidateEducation, Lifecycle::Deleted, Handler::ReindexCandidate),
];

/// Pairs missing from the table are ignored.
pub fn route(entity: Entity, lifecycle: Lifecycle) -> Handler {
    DISPATCH
        .iter()
        .find(|(e, l, _)| *e == entity && *l == lifecycle)
        .map(|(_, _, handler)| *handler)
        .unwrap_or(Handler::Ignore)
}

impl IndexEvent {
    pub fn kind(&self) -> (Entity, Lifecycle) {
        use IndexEvent::*;
        match self {
            JobCreated { .. } => (Entity::Job, Lifecycle::Created),
            JobUpdated { .. } => (Entity::Job, Lifecycle::Updated),
            JobDeleted { .. } => (Entity::Job, Lifecycle::Deleted),
            CandidateCreated { .. } => (Entity::Candidate, Lifecycle::Created),
            CandidateUpdated { .. } => (Entity::Candidate, Lifecycle::Updated),
            CandidateDeleted { .. } => (Entity::Candidate, Lifecycle::Deleted),
            CandidateSkillCreated { .. } => (Entity::CandidateSkill, Lifecycle::Created),
            CandidateSkillDeleted { .. } => (Entity::CandidateSkill, Lifecycle::Deleted),
            CandidateExperienceCreated { .. } => (Entity::CandidateExperience, Lifecycle::Created),
            CandidateExperienceUpdated { .. } => (Entity::CandidateExperience, Lifecycle::Updated),
            CandidateExperienceDeleted { .. } => (Entity::CandidateExperience, Lifecycle::Deleted),
            CandidateEducationCreated { .. } => (Entity::CandidateEducation, Lifecycle::Created),
            CandidateEducationUpdated { .. } => (Entity::CandidateEducation, Lifecycle::Updated),
            CandidateEducationDeleted { .. } => (Entity::CandidateEducation, Lifecycle::Deleted),
            ApplicationCreated { .. } => (Entity::Application, Lifecycle::Created),
        }
    }

    pub fn handler(&self) -> Handler {
        let (entity, lifecycle) = self.kind();
        route(entity, lifecycle)
    }

    /// Id of the job or candidate this event is about.
    pub fn subject_id(&self) -> DocId {
        use IndexEvent::*;
        match self {
            JobCreated { job } | JobUpdated { job } => job.id,
            JobDeleted { job_id } => *job_id,
            CandidateCreated { candidate } | CandidateUpdated { candidate } => candidate.id,
            CandidateDeleted { candidate_id }
            | CandidateSkillCreated { candidate_id, .. }
            | CandidateSkillDeleted { candidate_id, .. }
            | CandidateExperienceCreated { candidate_id, .. }
            | CandidateExperienceUpdated { candidate_id, .. }
            | CandidateExperienceDeleted { candidate_id, .. }
            | CandidateEducationCreated { candidate_id, .. }
            | CandidateEducationUpdated { candidate_id, .. }
            | CandidateEducationDeleted { candidate_id, .. } => *candidate_id,
            ApplicationCreated { application } => application.job_id,
        }
    }
}

pub struct IndexListener {
    jobs: Arc<IndexMaintainer>,
    candidates: Arc<IndexMaintainer>,
    directory: Arc<dyn CandidateDirectory>,
}

impl IndexListener {
    /// `directory` must already reflect the event when a sub-entity
    /// event is handled.
    pub fn new(
        jobs: Arc<IndexMaintainer>,
        candidates: Arc<IndexMaintainer>,
        directory: Arc<dyn CandidateDirectory>,
    ) -> Self {
        Self { jobs, candidates, directory }
    }

    /// Route `event` and run its handler. Returns the handler that ran.
    pub fn handle(&self, event: &IndexEvent) -> Handler {
        let handler = event.handler();
        let subject = event.subject_id();
        if let Err(err) = self.dispatch(handler, event) {
            tracing::error!(?handler, subject, error = %err, "index maintenance failed");
        }
        handler
    }

    fn dispatch(&self, handler: Handler, event: &IndexEvent) -> Result<()> {
        let subject = event.subject_id();
        match (handler, event) {
            (Handler::IndexJob, IndexEvent::JobCreated { job } | IndexEvent::JobUpdated { job }) => {
                let outcome = self.jobs.index(job, Mode::EventDriven)?;
                log_outcome(handler, subject, outcome);
            }
            (Handler::IndexCandidate, IndexEvent::CandidateCreated { candidate })
            | (Handler::IndexCandidate, IndexEvent::CandidateUpdated { candidate }) => {
                let outcome = self.candidates.index(candidate, Mode::EventDriven)?;
                log_outcome(handler, subject, outcome);
            }
            (Handler::RemoveJob, _) => {
                self.jobs.remove(subject)?;
            }
            (Handler::RemoveCandidate, _) => {
                self.candidates.remove(subject)?;
            }
            (Handler::ReindexCandidate, _) => match self.directory.candidate(subject)? {
                Some(candidate) => {
                    let outcome = self.candidates.index(&candidate, Mode::EventDriven)?;
                    log_outcome(handler, subject, outcome);
                }
                None => {
                    self.candidates.remove(subject)?;
                }
            },
            (Handler::Ignore, _) => tracing::trace!(subject, "event ignored by index"),
            (handler, event) => {
                tracing::warn!(?handler, kind = ?event.kind(), "dispatch table and event payload disagree")
            }
        }
        Ok(())
    }
}

fn log_outcome(handler: Handler, subject: DocId, outcome: IndexOutcome) {
    tracing::debug!(?handler, subject, ?outcome, "event handled");
}
