use crate::index::{DocId, IndexKind};

pub type Result<T> = std::result::Result<T, RankError>;

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    /// Composed text tokenized to nothing.
    #[error("no indexable content found for {kind} {document_id}")]
    NoContent { kind: IndexKind, document_id: DocId },

    #[error("company {company_id} does not own job {job_id}")]
    UnauthorizedRankingAccess { job_id: DocId, company_id: u64 },

    #[error("job {0} not found")]
    JobNotFound(DocId),

    #[error("index storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("index encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RankError {
    /// Storage-layer failures are recoverable by a rebuild; the rest are caller errors.
    pub fn is_maintenance_failure(&self) -> bool {
        matches!(
            self,
            RankError::Storage(_) | RankError::Codec(_) | RankError::Io(_) | RankError::Json(_)
        )
    }
}
