//! Ranks a job's applicants against the job's own requirements.
//!
//! The job is composed into a weighted query and scored against the
//! candidate index; only the job's applicants are kept. Applicants the
//! index knows nothing about still appear, with a score of zero.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bm25::{Bm25Params, Bm25Scorer};
use crate::catalog::{ApplicationLedger, CandidateDirectory, JobCatalog};
use crate::compose::compose_job_query;
use crate::config::{EngineConfig, DEFAULT_CANDIDATE_PAGE_SIZE};
use crate::error::{RankError, Result};
use crate::index::DocId;
use crate::model::{Application, CandidateRecord, JobRecord};
use crate::page::Page;
use crate::store::IndexStore;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    Bm25,
    /// No usable scores; most recent application first.
    Chronological,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedApplicant {
    pub application: Application,
    /// `None` when the directory no longer has the candidate.
    pub candidate: Option<CandidateRecord>,
    pub score: f64,
    /// 1-based, over all applicants rather than the page.
    pub rank_position: usize,
    pub matching_skills: Vec<String>,
    pub skill_match: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedApplicants {
    pub mode: RankingMode,
    #[serde(flatten)]
    pub page: Page<RankedApplicant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankingStatistics {
    pub total_applications: usize,
    pub indexed_candidates: u64,
    /// Applicants with a positive score.
    pub ranked_candidates: usize,
    /// Percentage of applicants ranked, one decimal.
    pub ranking_coverage: f64,
}

/// Skills the candidate shares with the job, in the candidate's order.
/// Names compare exactly.
pub fn matching_skills(candidate: &CandidateRecord, job: &JobRecord) -> Vec<String> {
    candidate.skills.iter().filter(|skill| job.skills.contains(skill)).cloned().collect()
}

/// Share of the job's skills the candidate has, in percent with one decimal.
pub fn skill_match_percentage(candidate: &CandidateRecord, job: &JobRecord) -> f64 {
    if job.skills.is_empty() {
        return 0.0;
    }
    round1(matching_skills(candidate, job).len() as f64 / job.skills.len() as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub struct CandidateRanking {
    jobs: Arc<dyn JobCatalog>,
    directory: Arc<dyn CandidateDirectory>,
    ledger: Arc<dyn ApplicationLedger>,
    store: Arc<dyn IndexStore>,
    tokenizer: Tokenizer,
    params: Bm25Params,
    page_size: usize,
}

impl CandidateRanking {
    pub fn new(
        jobs: Arc<dyn JobCatalog>,
        directory: Arc<dyn CandidateDirectory>,
        ledger: Arc<dyn ApplicationLedger>,
        store: Arc<dyn IndexStore>,
    ) -> Self {
        Self::with_config(jobs, directory, ledger, store, &EngineConfig::default())
    }

    pub fn with_config(
        jobs: Arc<dyn JobCatalog>,
        directory: Arc<dyn CandidateDirectory>,
        ledger: Arc<dyn ApplicationLedger>,
        store: Arc<dyn IndexStore>,
        config: &EngineConfig,
    ) -> Self {
        let page_size =
            if config.candidate_page_size == 0 { DEFAULT_CANDIDATE_PAGE_SIZE } else { config.candidate_page_size };
        Self { jobs, directory, ledger, store, tokenizer: Tokenizer::default(), params: config.bm25, page_size }
    }

    /// Look the job up and check that `company_id` owns it.
    fn owned_job(&self, job_id: DocId, company_id: u64) -> Result<JobRecord> {
        let job = self.jobs.job(job_id)?.ok_or(RankError::JobNotFound(job_id))?;
        if job.company_id != company_id {
            tracing::warn!(job_id, company_id, owner = job.company_id, "ranking access denied");
            return Err(RankError::UnauthorizedRankingAccess { job_id, company_id });
        }
        Ok(job)
    }

    /// Applications in the order ties keep: applied_at, then id.
    fn applications(&self, job_id: DocId) -> Result<Vec<Application>> {
        let mut applications = self.ledger.applications_for_job(job_id)?;
        applications.sort_by(|a, b| a.applied_at.cmp(&b.applied_at).then(a.id.cmp(&b.id)));
        Ok(applications)
    }

    /// BM25 scores of every indexed candidate against `job` as a query.
    /// Empty when the job yields no terms or the index is degenerate.
    pub fn score_candidates(&self, job: &JobRecord) -> Result<HashMap<DocId, f64>> {
        let terms = self.tokenizer.tokenize(&compose_job_query(job));
        if terms.is_empty() {
            tracing::debug!(job_id = job.id, "job has no query terms");
            return Ok(HashMap::new());
        }
        let stats = self.store.stats()?;
        if stats.is_degenerate() {
            tracing::info!(job_id = job.id, "candidate index is empty");
            return Ok(HashMap::new());
        }
        Bm25Scorer::new(self.params).score(self.store.as_ref(), &terms, stats.documents, stats.avg_doc_length())
    }

    /// Best-effort scores: failures degrade to no scores.
    fn scores_or_empty(&self, job: &JobRecord) -> HashMap<DocId, f64> {
        self.score_candidates(job).unwrap_or_else(|err| {
            tracing::warn!(job_id = job.id, error = %err, "candidate scoring failed");
            HashMap::new()
        })
    }

    pub fn rank_applicants(&self, job_id: DocId, company_id: u64, page: usize) -> Result<RankedApplicants> {
        let job = self.owned_job(job_id, company_id)?;
        let mut applications = self.applications(job_id)?;
        if applications.is_empty() {
            tracing::info!(job_id, "no applications");
            return Ok(RankedApplicants { mode: RankingMode::Bm25, page: Page::empty(self.page_size) });
        }

        let scores = self.scores_or_empty(&job);
        let (mode, scored) = if scores.is_empty() {
            tracing::info!(job_id, "no bm25 scores, falling back to chronological order");
            applications.reverse();
            (RankingMode::Chronological, applications.into_iter().map(|a| (a, 0.0)).collect::<Vec<_>>())
        } else {
            let mut scored: Vec<(Application, f64)> = applications
                .into_iter()
                .map(|a| {
                    let score = scores.get(&a.candidate_id).copied().unwrap_or(0.0);
                    (a, score)
                })
                .collect();
            // Stable: equal scores keep application order.
            scored.sort_by(|(_, sa), (_, sb)| sb.total_cmp(sa));
            (RankingMode::Bm25, scored)
        };

        let positioned: Vec<(usize, Application, f64)> =
            scored.into_iter().enumerate().map(|(i, (a, score))| (i + 1, a, score)).collect();
        let page = Page::paginate(positioned, page, self.page_size);
        let page = page.map(|(rank_position, application, score)| self.describe(&job, application, score, rank_position));
        Ok(RankedApplicants { mode, page })
    }

    fn describe(&self, job: &JobRecord, application: Application, score: f64, rank_position: usize) -> RankedApplicant {
        let candidate = self.directory.candidate(application.candidate_id).unwrap_or_else(|err| {
            tracing::warn!(candidate_id = application.candidate_id, error = %err, "candidate lookup failed");
            None
        });
        let (matching_skills, skill_match) = match &candidate {
            Some(c) => (matching_skills(c, job), skill_match_percentage(c, job)),
            None => (Vec::new(), 0.0),
        };
        RankedApplicant { application, candidate, score, rank_position, matching_skills, skill_match }
    }

    pub fn ranking_statistics(&self, job_id: DocId, company_id: u64) -> Result<RankingStatistics> {
        let job = self.owned_job(job_id, company_id)?;
        let applications = self.ledger.applications_for_job(job_id)?;
        let indexed_candidates = self.store.stats()?.documents;
        let scores = self.scores_or_empty(&job);
        let ranked_candidates = applications
            .iter()
            .filter(|a| scores.get(&a.candidate_id).is_some_and(|s| *s > 0.0))
            .count();
        let ranking_coverage = if applications.is_empty() {
            0.0
        } else {
            round1(ranked_candidates as f64 / applications.len() as f64 * 100.0)
        };
        Ok(RankingStatistics {
            total_applications: applications.len(),
            indexed_candidates,
            ranked_candidates,
            ranking_coverage,
        })
    }
}
