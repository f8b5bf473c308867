//! Free-text job search: BM25 over the job index merged with relational
//! filters, with a filter-only fallback.

use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use time::Date;

use crate::bm25::{Bm25Params, Bm25Scorer};
use crate::catalog::JobCatalog;
use crate::config::{EngineConfig, DEFAULT_JOB_PAGE_SIZE};
use crate::error::Result;
use crate::index::DocId;
use crate::model::JobRecord;
use crate::page::Page;
use crate::store::IndexStore;
use crate::tokenizer::Tokenizer;

/// Category given either by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    Id(u64),
    Slug(String),
}

impl FromStr for CategoryFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u64>() {
            Ok(id) => CategoryFilter::Id(id),
            Err(_) => CategoryFilter::Slug(s.to_string()),
        })
    }
}

/// Relational filters. Zero-valued ids and salaries count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilters {
    pub country: Option<u64>,
    pub state: Option<u64>,
    pub city: Option<u64>,
    pub category: Option<CategoryFilter>,
    /// Job type slugs; a job matches any of them.
    pub job_types: Vec<String>,
    pub experience: Option<u64>,
    /// Matches when either end of the job's range reaches it.
    pub min_salary: Option<u64>,
    /// Matches when the job's maximum stays within it.
    pub max_salary: Option<u64>,
}

fn set(value: Option<u64>) -> Option<u64> {
    value.filter(|v| *v > 0)
}

impl JobFilters {
    pub fn matches(&self, job: &JobRecord) -> bool {
        if let Some(country) = set(self.country) {
            if job.country_id != Some(country) {
                return false;
            }
        }
        if let Some(state) = set(self.state) {
            if job.state_id != Some(state) {
                return false;
            }
        }
        if let Some(city) = set(self.city) {
            if job.city_id != Some(city) {
                return false;
            }
        }
        match &self.category {
            Some(CategoryFilter::Id(id)) if *id > 0 => {
                if job.category.as_ref().map(|c| c.id) != Some(*id) {
                    return false;
                }
            }
            Some(CategoryFilter::Slug(slug)) if !slug.is_empty() => {
                if job.category.as_ref().map(|c| c.slug.as_str()) != Some(slug.as_str()) {
                    return false;
                }
            }
            _ => {}
        }
        if !self.job_types.is_empty() {
            let matched = job.job_type.as_ref().is_some_and(|t| self.job_types.iter().any(|s| s == t));
            if !matched {
                return false;
            }
        }
        if let Some(experience) = set(self.experience) {
            if job.experience_id != Some(experience) {
                return false;
            }
        }
        if let Some(min) = set(self.min_salary) {
            let reaches = job.min_salary.is_some_and(|s| s >= min) || job.max_salary.is_some_and(|s| s >= min);
            if !reaches {
                return false;
            }
        }
        if let Some(max) = set(self.max_salary) {
            if !job.max_salary.is_some_and(|s| s <= max) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub filters: JobFilters,
    /// 1-based.
    pub page: usize,
    /// Per-request BM25 constants; the engine's defaults otherwise.
    pub bm25: Option<Bm25Params>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Ranked,
    Filtered,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub job: JobRecord,
    /// Present in ranked mode only.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub mode: SearchMode,
    #[serde(flatten)]
    pub page: Page<SearchHit>,
}

pub struct JobSearch {
    catalog: Arc<dyn JobCatalog>,
    store: Arc<dyn IndexStore>,
    tokenizer: Tokenizer,
    params: Bm25Params,
    page_size: usize,
}

impl JobSearch {
    pub fn new(catalog: Arc<dyn JobCatalog>, store: Arc<dyn IndexStore>) -> Self {
        Self::with_config(catalog, store, &EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn JobCatalog>, store: Arc<dyn IndexStore>, config: &EngineConfig) -> Self {
        let page_size = if config.job_page_size == 0 { DEFAULT_JOB_PAGE_SIZE } else { config.job_page_size };
        Self { catalog, store, tokenizer: Tokenizer::default(), params: config.bm25, page_size }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    pub fn search(&self, request: &SearchRequest, today: Date) -> Result<SearchResults> {
        let query = request.query.trim();
        if query.is_empty() {
            return self.filtered(&request.filters, request.page, today);
        }

        let terms = self.tokenizer.tokenize(query);
        if terms.is_empty() {
            tracing::debug!(query, "query has no index terms, using filters only");
            return self.filtered(&request.filters, request.page, today);
        }

        let open = self.catalog.open_jobs(today)?;
        // N must count the same corpus doc_freq was counted over; the open-job
        // restriction happens in the merge.
        let stats = self.store.stats()?;
        let total_docs = stats.documents;
        let avg_doc_length = stats.avg_doc_length();
        if open.is_empty() || stats.is_degenerate() {
            tracing::info!(open = open.len(), total_docs, avg_doc_length, "bm25 fallback: no open jobs or empty index");
            return self.filtered(&request.filters, request.page, today);
        }

        let scorer = Bm25Scorer::new(request.bm25.unwrap_or(self.params));
        let scores = match scorer.score(self.store.as_ref(), &terms, total_docs, avg_doc_length) {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!(error = %err, "bm25 scoring failed, using filters only");
                return self.filtered(&request.filters, request.page, today);
            }
        };
        if scores.is_empty() {
            tracing::info!(query, "bm25 fallback: no results");
            return self.filtered(&request.filters, request.page, today);
        }

        Ok(self.merge(open, &scores, &request.filters, request.page))
    }

    /// Open jobs passing `filters`, newest first.
    pub fn filtered(&self, filters: &JobFilters, page: usize, today: Date) -> Result<SearchResults> {
        let mut jobs: Vec<JobRecord> =
            self.catalog.open_jobs(today)?.into_iter().filter(|job| filters.matches(job)).collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        let page = Page::paginate(jobs, page, self.page_size).map(|job| SearchHit { job, score: None });
        Ok(SearchResults { mode: SearchMode::Filtered, page })
    }

    fn merge(
        &self,
        open: Vec<JobRecord>,
        scores: &HashMap<DocId, f64>,
        filters: &JobFilters,
        page: usize,
    ) -> SearchResults {
        let mut hits: Vec<(f64, JobRecord)> = open
            .into_iter()
            .filter(|job| filters.matches(job))
            .filter_map(|job| scores.get(&job.id).map(|score| (*score, job)))
            .collect();
        hits.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then(a.id.cmp(&b.id)));
        tracing::debug!(scored = scores.len(), matched = hits.len(), "bm25 results merged with filters");

        let page = Page::paginate(hits, page, self.page_size).map(|(score, job)| SearchHit { job, score: Some(score) });
        SearchResults { mode: SearchMode::Ranked, page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, JobStatus};
    use time::macros::date;

    fn job(id: DocId) -> JobRecord {
        JobRecord {
            id,
            company_id: 1,
            title: "Developer".into(),
            description: String::new(),
            skills: vec![],
            category: Some(Category { id: 4, name: "Engineering".into(), slug: "engineering".into() }),
            role: None,
            tags: vec![],
            company_name: None,
            country_id: Some(1),
            state_id: Some(2),
            city_id: Some(3),
            job_type: Some("full-time".into()),
            experience_id: Some(5),
            min_salary: Some(40_000),
            max_salary: Some(60_000),
            status: JobStatus::Active,
            deadline: date!(2026 - 12 - 31),
        }
    }

    #[test]
    fn category_parses_id_or_slug() {
        assert_eq!("12".parse::<CategoryFilter>().unwrap(), CategoryFilter::Id(12));
        assert_eq!("design".parse::<CategoryFilter>().unwrap(), CategoryFilter::Slug("design".into()));
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(JobFilters::default().matches(&job(1)));
        let zeros = JobFilters { country: Some(0), min_salary: Some(0), max_salary: Some(0), ..Default::default() };
        assert!(zeros.matches(&job(1)));
    }

    #[test]
    fn location_category_and_type() {
        let j = job(1);
        assert!(JobFilters { country: Some(1), state: Some(2), city: Some(3), ..Default::default() }.matches(&j));
        assert!(!JobFilters { city: Some(9), ..Default::default() }.matches(&j));
        assert!(JobFilters { category: Some(CategoryFilter::Id(4)), ..Default::default() }.matches(&j));
        assert!(JobFilters { category: Some(CategoryFilter::Slug("engineering".into())), ..Default::default() }
            .matches(&j));
        assert!(!JobFilters { category: Some(CategoryFilter::Slug("design".into())), ..Default::default() }
            .matches(&j));
        let types = vec!["part-time".to_string(), "full-time".to_string()];
        assert!(JobFilters { job_types: types, ..Default::default() }.matches(&j));
        assert!(!JobFilters { job_types: vec!["internship".into()], ..Default::default() }.matches(&j));
        assert!(!JobFilters { experience: Some(6), ..Default::default() }.matches(&j));
    }

    #[test]
    fn salary_bounds() {
        let j = job(1);
        // Either end of the range may reach the minimum.
        assert!(JobFilters { min_salary: Some(50_000), ..Default::default() }.matches(&j));
        assert!(!JobFilters { min_salary: Some(70_000), ..Default::default() }.matches(&j));
        assert!(JobFilters { max_salary: Some(60_000), ..Default::default() }.matches(&j));
        assert!(!JobFilters { max_salary: Some(55_000), ..Default::default() }.matches(&j));

        let unpaid = JobRecord { min_salary: None, max_salary: None, ..job(2) };
        assert!(!JobFilters { max_salary: Some(55_000), ..Default::default() }.matches(&unpaid));
    }
}
