//! Relational collaborators the orchestrators read from.
//!
//! The job board's own database owns these records; the engine only needs
//! lookups. [`MemoryCatalog`] backs the CLI and the HTTP service with records
//! loaded from JSON files and kept current by lifecycle events.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use time::Date;

use crate::error::Result;
use crate::events::IndexEvent;
use crate::index::DocId;
use crate::model::{Application, CandidateRecord, JobRecord};

pub trait JobCatalog: Send + Sync {
    fn job(&self, job_id: DocId) -> Result<Option<JobRecord>>;

    /// Active jobs whose deadline is `today` or later.
    fn open_jobs(&self, today: Date) -> Result<Vec<JobRecord>>;
}

pub trait CandidateDirectory: Send + Sync {
    fn candidate(&self, candidate_id: DocId) -> Result<Option<CandidateRecord>>;
}

pub trait ApplicationLedger: Send + Sync {
    /// Every application to `job_id`, in no particular order.
    fn applications_for_job(&self, job_id: DocId) -> Result<Vec<Application>>;
}

#[derive(Default)]
struct Tables {
    jobs: BTreeMap<DocId, JobRecord>,
    candidates: BTreeMap<DocId, CandidateRecord>,
    applications: BTreeMap<u64, Application>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    inner: RwLock<Tables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        jobs: Vec<JobRecord>,
        candidates: Vec<CandidateRecord>,
        applications: Vec<Application>,
    ) -> Self {
        let catalog = Self::new();
        {
            let mut t = catalog.inner.write();
            t.jobs.extend(jobs.into_iter().map(|j| (j.id, j)));
            t.candidates.extend(candidates.into_iter().map(|c| (c.id, c)));
            t.applications.extend(applications.into_iter().map(|a| (a.id, a)));
        }
        catalog
    }

    pub fn upsert_job(&self, job: JobRecord) {
        self.inner.write().jobs.insert(job.id, job);
    }

    /// Drops the job and its applications.
    pub fn remove_job(&self, job_id: DocId) -> Option<JobRecord> {
        let mut t = self.inner.write();
        t.applications.retain(|_, a| a.job_id != job_id);
        t.jobs.remove(&job_id)
    }

    pub fn upsert_candidate(&self, candidate: CandidateRecord) {
        self.inner.write().candidates.insert(candidate.id, candidate);
    }

    /// Drops the candidate and their applications.
    pub fn remove_candidate(&self, candidate_id: DocId) -> Option<CandidateRecord> {
        let mut t = self.inner.write();
        t.applications.retain(|_, a| a.candidate_id != candidate_id);
        t.candidates.remove(&candidate_id)
    }

    pub fn add_application(&self, application: Application) {
        self.inner.write().applications.insert(application.id, application);
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        self.inner.read().jobs.values().cloned().collect()
    }

    pub fn candidates(&self) -> Vec<CandidateRecord> {
        self.inner.read().candidates.values().cloned().collect()
    }

    /// Mirror a lifecycle event into the tables. Sub-entity events edit the
    /// owning candidate in place; events for unknown candidates are ignored.
    pub fn apply(&self, event: &IndexEvent) {
        match event {
            IndexEvent::JobCreated { job } | IndexEvent::JobUpdated { job } => self.upsert_job(job.clone()),
            IndexEvent::JobDeleted { job_id } => {
                self.remove_job(*job_id);
            }
            IndexEvent::CandidateCreated { candidate } | IndexEvent::CandidateUpdated { candidate } => {
                self.upsert_candidate(candidate.clone())
            }
            IndexEvent::CandidateDeleted { candidate_id } => {
                self.remove_candidate(*candidate_id);
            }
            IndexEvent::CandidateSkillCreated { candidate_id, skill } => self.edit_candidate(*candidate_id, |c| {
                if !c.skills.contains(skill) {
                    c.skills.push(skill.clone());
                }
            }),
            IndexEvent::CandidateSkillDeleted { candidate_id, skill } => {
                self.edit_candidate(*candidate_id, |c| c.skills.retain(|s| s != skill))
            }
            IndexEvent::CandidateExperienceCreated { candidate_id, experience }
            | IndexEvent::CandidateExperienceUpdated { candidate_id, experience } => {
                self.edit_candidate(*candidate_id, |c| {
                    match c.experiences.iter_mut().find(|e| e.id == experience.id) {
                        Some(existing) => *existing = experience.clone(),
                        None => c.experiences.push(experience.clone()),
                    }
                })
            }
            IndexEvent::CandidateExperienceDeleted { candidate_id, experience_id } => {
                self.edit_candidate(*candidate_id, |c| c.experiences.retain(|e| e.id != *experience_id))
            }
            IndexEvent::CandidateEducationCreated { candidate_id, education }
            | IndexEvent::CandidateEducationUpdated { candidate_id, education } => {
                self.edit_candidate(*candidate_id, |c| {
                    match c.educations.iter_mut().find(|e| e.id == education.id) {
                        Some(existing) => *existing = education.clone(),
                        None => c.educations.push(education.clone()),
                    }
                })
            }
            IndexEvent::CandidateEducationDeleted { candidate_id, education_id } => {
                self.edit_candidate(*candidate_id, |c| c.educations.retain(|e| e.id != *education_id))
            }
            IndexEvent::ApplicationCreated { application } => self.add_application(application.clone()),
        }
    }

    fn edit_candidate<F: FnOnce(&mut CandidateRecord)>(&self, candidate_id: DocId, edit: F) {
        match self.inner.write().candidates.get_mut(&candidate_id) {
            Some(candidate) => edit(candidate),
            None => tracing::debug!(candidate_id, "event for unknown candidate ignored by catalog"),
        }
    }
}

impl JobCatalog for MemoryCatalog {
    fn job(&self, job_id: DocId) -> Result<Option<JobRecord>> {
        Ok(self.inner.read().jobs.get(&job_id).cloned())
    }

    fn open_jobs(&self, today: Date) -> Result<Vec<JobRecord>> {
        Ok(self.inner.read().jobs.values().filter(|j| j.is_open(today)).cloned().collect())
    }
}

impl CandidateDirectory for MemoryCatalog {
    fn candidate(&self, candidate_id: DocId) -> Result<Option<CandidateRecord>> {
        Ok(self.inner.read().candidates.get(&candidate_id).cloned())
    }
}

impl ApplicationLedger for MemoryCatalog {
    fn applications_for_job(&self, job_id: DocId) -> Result<Vec<Application>> {
        Ok(self.inner.read().applications.values().filter(|a| a.job_id == job_id).cloned().collect())
    }
}
