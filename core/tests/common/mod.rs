#![allow(dead_code)]

use jobrank_core::model::{Application, CandidateRecord, Category, JobRecord, JobStatus};
use jobrank_core::DocId;
use time::macros::{date, datetime};
use time::{Date, Duration};

pub const TODAY: Date = date!(2026 - 03 - 10);

pub fn job(id: DocId, title: &str, description: &str) -> JobRecord {
    JobRecord {
        id,
        company_id: 1,
        title: title.into(),
        description: description.into(),
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
        status: JobStatus::Active,
        deadline: date!(2026 - 12 - 31),
    }
}

pub fn with_category(mut job: JobRecord, id: u64, name: &str, slug: &str) -> JobRecord {
    job.category = Some(Category { id, name: name.into(), slug: slug.into() });
    job
}

pub fn candidate(id: DocId, skills: &[&str]) -> CandidateRecord {
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

/// Applications land one day apart in id order.
pub fn application(id: u64, job_id: DocId, candidate_id: DocId) -> Application {
    Application {
        id,
        job_id,
        candidate_id,
        applied_at: datetime!(2026-03-01 09:00 UTC) + Duration::days(id as i64),
        status: Default::default(),
    }
}
