use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use jobrank_core::catalog::MemoryCatalog;
use jobrank_core::config::EngineConfig;
use jobrank_core::events::{IndexEvent, IndexListener};
use jobrank_core::model::{Application, CandidateRecord, JobRecord};
use jobrank_core::persist::{save_meta, IndexPaths, MetaFile, SledStore};
use jobrank_core::ranking::{CandidateRanking, RankedApplicants, RankingStatistics};
use jobrank_core::search::{CategoryFilter, JobFilters, JobSearch, SearchRequest, SearchResults};
use jobrank_core::source::read_records;
use jobrank_core::{DocId, IndexKind, IndexMaintainer, IndexStore, RankError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::path::{Path as FsPath, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppOptions {
    /// Root holding one sled database per index.
    pub index_dir: PathBuf,
    /// Directory with `jobs`, `candidates` and `applications` record files.
    pub data_dir: Option<PathBuf>,
    pub config: EngineConfig,
    pub admin_token: Option<String>,
    /// Rebuild both indexes from the loaded records before serving.
    pub rebuild_on_start: bool,
    /// Allowed CORS origins; any origin when empty.
    pub cors_origins: Vec<String>,
}

impl AppOptions {
    pub fn new<P: Into<PathBuf>>(index_dir: P) -> Self {
        Self {
            index_dir: index_dir.into(),
            data_dir: None,
            config: EngineConfig::default(),
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            rebuild_on_start: false,
            cors_origins: std::env::var("CORS_ALLOW_ORIGIN")
                .map(|val| val.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<MemoryCatalog>,
    pub search: Arc<JobSearch>,
    pub ranking: Arc<CandidateRanking>,
    pub listener: Arc<IndexListener>,
    pub config: EngineConfig,
    pub admin_token: Option<String>,
}

/// Loads `<dir>/<name>.json`, `<dir>/<name>.jsonl` or the `<dir>/<name>/` directory.
fn load_records<T: DeserializeOwned>(dir: &FsPath, name: &str) -> Result<Vec<T>> {
    let candidates = [dir.join(format!("{name}.json")), dir.join(format!("{name}.jsonl")), dir.join(name)];
    match candidates.iter().find(|p| p.exists()) {
        Some(path) => Ok(read_records(path)?),
        None => {
            tracing::warn!(dir = %dir.display(), name, "no record file found");
            Ok(Vec::new())
        }
    }
}

fn load_catalog(data_dir: Option<&FsPath>) -> Result<MemoryCatalog> {
    let Some(dir) = data_dir else { return Ok(MemoryCatalog::new()) };
    let jobs: Vec<JobRecord> = load_records(dir, "jobs")?;
    let candidates: Vec<CandidateRecord> = load_records(dir, "candidates")?;
    let applications: Vec<Application> = load_records(dir, "applications")?;
    tracing::info!(
        jobs = jobs.len(),
        candidates = candidates.len(),
        applications = applications.len(),
        "catalog loaded"
    );
    Ok(MemoryCatalog::from_records(jobs, candidates, applications))
}

fn rebuild(paths: &IndexPaths, catalog: &MemoryCatalog, jobs: &IndexMaintainer, candidates: &IndexMaintainer) -> Result<()> {
    let reports = [jobs.rebuild(catalog.jobs(), true, |_| {})?, candidates.rebuild(catalog.candidates(), true, |_| {})?];
    for (report, maintainer) in reports.iter().zip([jobs, candidates]) {
        save_meta(paths, &MetaFile::for_rebuild(report, maintainer.store().stats()?.documents))?;
        tracing::info!(
            kind = %report.kind,
            indexed = report.indexed,
            skipped = report.skipped.len(),
            removed = report.removed,
            "index rebuilt on startup"
        );
    }
    Ok(())
}

pub fn build_app(options: AppOptions) -> Result<Router> {
    let paths = IndexPaths::new(&options.index_dir);
    let job_store: Arc<dyn IndexStore> = Arc::new(SledStore::open(&paths, IndexKind::Job)?);
    let candidate_store: Arc<dyn IndexStore> = Arc::new(SledStore::open(&paths, IndexKind::Candidate)?);
    let catalog = Arc::new(load_catalog(options.data_dir.as_deref())?);

    let jobs = Arc::new(IndexMaintainer::new(IndexKind::Job, job_store.clone()));
    let candidates = Arc::new(IndexMaintainer::new(IndexKind::Candidate, candidate_store.clone()));
    if options.rebuild_on_start {
        rebuild(&paths, &catalog, &jobs, &candidates)?;
    }

    let config = options.config;
    let state = AppState {
        search: Arc::new(JobSearch::with_config(catalog.clone(), job_store, &config)),
        ranking: Arc::new(CandidateRanking::with_config(
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
            candidate_store,
            &config,
        )),
        listener: Arc::new(IndexListener::new(jobs, candidates, catalog.clone())),
        catalog,
        config,
        admin_token: options.admin_token,
    };
    Ok(router(state, cors_layer(&options.cors_origins)))
}

/// Origins that fail to parse as header values are dropped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        tracing::debug!(origins = allowed.len(), "cors restricted to configured origins");
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/jobs/search", get(search_handler))
        .route("/jobs/:job_id/applicants/ranked", get(ranked_handler))
        .route("/jobs/:job_id/applicants/stats", get(stats_handler))
        .route("/events", post(event_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Empty query-string values (`?country=`) count as absent.
fn blank_as_none<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn first_page() -> usize {
    1
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub country: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub state: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub city: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub category: Option<String>,
    /// Comma-separated job type slugs.
    #[serde(default)]
    pub jobtype: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub experience: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub min_salary: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub max_salary: Option<u64>,
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub k1: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub b: Option<f64>,
}

impl SearchParams {
    fn filters(&self) -> JobFilters {
        JobFilters {
            country: self.country,
            state: self.state,
            city: self.city,
            category: self.category.as_deref().and_then(|c| CategoryFilter::from_str(c).ok()),
            job_types: self
                .jobtype
                .as_deref()
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            experience: self.experience,
            min_salary: self.min_salary,
            max_salary: self.max_salary,
        }
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    #[serde(flatten)]
    pub results: SearchResults,
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default = "first_page")]
    pub page: usize,
}

type ApiError = (StatusCode, String);

fn rank_error(err: RankError) -> ApiError {
    let status = match &err {
        RankError::UnauthorizedRankingAccess { .. } => StatusCode::FORBIDDEN,
        RankError::JobNotFound(_) => StatusCode::NOT_FOUND,
        RankError::NoContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let bm25 = (params.k1.is_some() || params.b.is_some())
        .then(|| state.config.bm25.with_overrides(params.k1, params.b));
    let request = SearchRequest { query: params.q.clone(), filters: params.filters(), page: params.page, bm25 };
    let results = state.search.search(&request, today()).map_err(rank_error)?;
    Ok(Json(SearchResponse { query: params.q, took_ms: start.elapsed().as_millis(), results }))
}

const COMPANY_HEADER: &str = "X-COMPANY-ID";
const ADMIN_TOKEN_HEADER: &str = "X-ADMIN-TOKEN";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// The company making the request; ownership of the job is checked by the ranking.
fn company_id(headers: &HeaderMap) -> Result<u64, ApiError> {
    header(headers, COMPANY_HEADER)
        .and_then(|v| v.parse().ok())
        .ok_or((StatusCode::UNAUTHORIZED, format!("missing or invalid {COMPANY_HEADER}")))
}

pub async fn ranked_handler(
    State(state): State<AppState>,
    Path(job_id): Path<DocId>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Json<RankedApplicants>, ApiError> {
    let company_id = company_id(&headers)?;
    let ranked = state.ranking.rank_applicants(job_id, company_id, params.page).map_err(rank_error)?;
    Ok(Json(ranked))
}

pub async fn stats_handler(
    State(state): State<AppState>,
    Path(job_id): Path<DocId>,
    headers: HeaderMap,
) -> Result<Json<RankingStatistics>, ApiError> {
    let company_id = company_id(&headers)?;
    let stats = state.ranking.ranking_statistics(job_id, company_id).map_err(rank_error)?;
    Ok(Json(stats))
}

pub async fn event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<IndexEvent>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.require_admin(&headers)?;
    state.catalog.apply(&event);
    let handler = state.listener.handle(&event);
    Ok(Json(serde_json::json!({ "subject_id": event.subject_id(), "handler": handler })))
}

impl AppState {
    /// Event ingestion stays closed until an admin token is configured.
    fn require_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.admin_token.as_deref() else {
            tracing::warn!("event rejected: no admin token configured");
            return Err((StatusCode::UNAUTHORIZED, "event ingestion is disabled".into()));
        };
        match header(headers, ADMIN_TOKEN_HEADER) {
            Some(token) if token == expected => Ok(()),
            provided => {
                tracing::warn!(present = provided.is_some(), "event rejected: bad admin token");
                Err((StatusCode::UNAUTHORIZED, format!("missing or invalid {ADMIN_TOKEN_HEADER}")))
            }
        }
    }
}
