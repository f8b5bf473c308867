//! Entity records as the relational layer hands them over, with their
//! related sub-entities already loaded.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::index::DocId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Pending,
    Expired,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: DocId,
    pub company_id: u64,
    pub title: String,
    /// HTML.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub role: Option<String>,
    /// Never indexed.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Never indexed.
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub country_id: Option<u64>,
    #[serde(default)]
    pub state_id: Option<u64>,
    #[serde(default)]
    pub city_id: Option<u64>,
    /// Job type slug, e.g. `full-time`.
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub experience_id: Option<u64>,
    #[serde(default)]
    pub min_salary: Option<u64>,
    #[serde(default)]
    pub max_salary: Option<u64>,
    pub status: JobStatus,
    pub deadline: Date,
}

impl JobRecord {
    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Active
    }

    /// Active and still accepting applications on `today`.
    pub fn is_open(&self, today: Date) -> bool {
        self.is_active() && self.deadline >= today
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub id: u64,
    #[serde(default)]
    pub designation: Option<String>,
    /// HTML.
    #[serde(default)]
    pub responsibilities: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub id: u64,
    #[serde(default)]
    pub degree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: DocId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub educations: Vec<Education>,
    #[serde(default)]
    pub profession: Option<String>,
    // Contact details stay out of the index.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_complete: bool,
    #[serde(default)]
    pub visibility: bool,
}

impl CandidateRecord {
    pub fn is_searchable(&self) -> bool {
        self.profile_complete && self.visibility
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    UnderReview,
    Shortlisted,
    CalledForInterview,
    Rejected,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::UnderReview => "Under Review",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::CalledForInterview => "Called for Interview",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

/// A candidate's application to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: u64,
    pub job_id: DocId,
    pub candidate_id: DocId,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    #[serde(default)]
    pub status: ApplicationStatus,
}
