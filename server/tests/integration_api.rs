use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_app, AppOptions};
use std::fs;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const ADMIN: &str = "s3cret";

fn job(id: u64, company_id: u64, title: &str, description: &str, skills: &[&str]) -> Value {
    json!({
        "id": id,
        "company_id": company_id,
        "title": title,
        "description": description,
        "skills": skills,
        "category": {"id": 1, "name": "Engineering", "slug": "engineering"},
        "status": "active",
        "deadline": "2099-12-31"
    })
}

fn candidate(id: u64, skills: &[&str]) -> Value {
    json!({ "id": id, "skills": skills, "profile_complete": true, "visibility": true })
}

fn application(id: u64, job_id: u64, candidate_id: u64, day: u32) -> Value {
    json!({
        "id": id,
        "job_id": job_id,
        "candidate_id": candidate_id,
        "applied_at": format!("2026-03-{day:02}T09:00:00Z")
    })
}

/// Returns the app and the directory holding its data and index.
fn app() -> (Router, TempDir) {
    app_with(|_| {})
}

fn app_with(configure: impl FnOnce(&mut AppOptions)) -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    let jobs = json!([
        job(1, 100, "Laravel Developer", "<p>Build APIs</p>", &["PHP"]),
        job(2, 100, "React Frontend Developer", "Build UI", &["React"]),
        job(3, 200, "Platform Engineer", "", &["Go", "Kubernetes"]),
    ]);
    let candidates = json!([candidate(1, &["Go", "Kubernetes"]), candidate(2, &["Photoshop"])]);
    let applications = json!([application(1, 3, 2, 1), application(2, 3, 1, 2)]);
    fs::write(data.join("jobs.json"), jobs.to_string()).unwrap();
    fs::write(data.join("candidates.json"), candidates.to_string()).unwrap();
    let lines: Vec<String> = applications.as_array().unwrap().iter().map(Value::to_string).collect();
    fs::write(data.join("applications.jsonl"), lines.join("\n")).unwrap();

    let mut options = AppOptions::new(dir.path().join("index"));
    options.data_dir = Some(data);
    options.admin_token = Some(ADMIN.into());
    options.rebuild_on_start = true;
    configure(&mut options);
    (build_app(options).unwrap(), dir)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: &Router, uri: &str, company: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::get(uri);
    if let Some(company) = company {
        req = req.header("X-COMPANY-ID", company);
    }
    let (status, body) = send(app, req.body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_event(app: &Router, event: Value, token: &str) -> StatusCode {
    let req = Request::post("/events")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", token)
        .body(Body::from(event.to_string()))
        .unwrap();
    send(app, req).await.0
}

fn job_ids(json: &Value) -> Vec<u64> {
    json["items"].as_array().unwrap().iter().map(|hit| hit["job"]["id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _dir) = app();
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_ranks_jobs() {
    let (app, _dir) = app();
    let (status, json) = get(&app, "/jobs/search?q=developer%20APIs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "ranked");
    assert_eq!(json["query"], "developer APIs");
    assert_eq!(job_ids(&json), vec![1, 2]);
    assert!(json["items"][0]["score"].as_f64().unwrap() > json["items"][1]["score"].as_f64().unwrap());
    assert_eq!(json["per_page"], 8);
}

#[tokio::test]
async fn search_without_query_lists_newest_first() {
    let (app, _dir) = app();
    let (status, json) = get(&app, "/jobs/search?q=&country=&category=engineering", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "filtered");
    assert_eq!(job_ids(&json), vec![3, 2, 1]);
    assert!(json["items"][0]["score"].is_null());
}

#[tokio::test]
async fn search_accepts_bm25_overrides() {
    let (app, _dir) = app();
    let (status, json) = get(&app, "/jobs/search?q=developer&k1=2.0&b=0", None).await;
    assert_eq!(status, StatusCode::OK);
    let scores: Vec<f64> = json["items"].as_array().unwrap().iter().map(|h| h["score"].as_f64().unwrap()).collect();
    assert_eq!(scores.len(), 2);
    assert!((scores[0] - scores[1]).abs() < 1e-9);
}

#[tokio::test]
async fn ranked_applicants_for_the_owner() {
    let (app, _dir) = app();
    let (status, json) = get(&app, "/jobs/3/applicants/ranked", Some("200")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "bm25");
    let items = json["items"].as_array().unwrap();
    assert_eq!(items[0]["application"]["candidate_id"], 1);
    assert_eq!(items[0]["rank_position"], 1);
    assert_eq!(items[0]["skill_match"], 100.0);
    assert_eq!(items[1]["application"]["candidate_id"], 2);
    assert_eq!(items[1]["score"], 0.0);
}

#[tokio::test]
async fn ranked_applicants_reject_other_companies() {
    let (app, _dir) = app();
    assert_eq!(get(&app, "/jobs/3/applicants/ranked", Some("100")).await.0, StatusCode::FORBIDDEN);
    assert_eq!(get(&app, "/jobs/3/applicants/ranked", None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(get(&app, "/jobs/99/applicants/ranked", Some("200")).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ranking_statistics() {
    let (app, _dir) = app();
    let (status, json) = get(&app, "/jobs/3/applicants/stats", Some("200")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_applications"], 2);
    assert_eq!(json["indexed_candidates"], 2);
    assert_eq!(json["ranked_candidates"], 1);
    assert_eq!(json["ranking_coverage"], 50.0);
}

#[tokio::test]
async fn events_require_the_admin_token() {
    let (app, _dir) = app();
    let event = json!({"event": "job_deleted", "job_id": 1});
    assert_eq!(post_event(&app, event, "wrong").await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn events_are_refused_without_a_configured_token() {
    let (app, _dir) = app_with(|options| options.admin_token = None);
    let event = json!({"event": "job_deleted", "job_id": 1});
    assert_eq!(post_event(&app, event, "").await, StatusCode::UNAUTHORIZED);
    let (_, json) = get(&app, "/jobs/search?q=laravel", None).await;
    assert_eq!(job_ids(&json), vec![1]);
}

#[tokio::test]
async fn cors_echoes_configured_origins_only() {
    let (app, _dir) = app_with(|options| options.cors_origins = vec!["https://jobs.example".into()]);
    let allowed = Request::get("/health").header("Origin", "https://jobs.example").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "https://jobs.example");

    let other = Request::get("/health").header("Origin", "https://elsewhere.example").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(other).await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn events_update_search_results() {
    let (app, _dir) = app();
    let created = json!({"event": "job_created", "job": job(4, 100, "Rust Developer", "Build APIs in Rust", &["Rust"])});
    assert_eq!(post_event(&app, created, ADMIN).await, StatusCode::OK);
    let (_, json) = get(&app, "/jobs/search?q=rust", None).await;
    assert_eq!(json["mode"], "ranked");
    assert_eq!(job_ids(&json), vec![4]);

    assert_eq!(post_event(&app, json!({"event": "job_deleted", "job_id": 4}), ADMIN).await, StatusCode::OK);
    let (_, json) = get(&app, "/jobs/search?q=rust", None).await;
    assert_eq!(json["mode"], "filtered");
    assert!(!job_ids(&json).contains(&4));
}

#[tokio::test]
async fn skill_events_change_applicant_ranking() {
    let (app, _dir) = app();
    let added = json!({"event": "candidate_skill_created", "candidate_id": 2, "skill": "Kubernetes"});
    assert_eq!(post_event(&app, added, ADMIN).await, StatusCode::OK);
    let (_, json) = get(&app, "/jobs/3/applicants/stats", Some("200")).await;
    assert_eq!(json["ranked_candidates"], 2);
}
