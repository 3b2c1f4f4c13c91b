//! Storage seams the analysis pipeline reads from and writes to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::analysis::{AnalysisId, AnalysisResult};
use crate::domain::record::{
    ActivityRecord, ApplicationUsageRecord, BudgetLimits, TransactionRecord, UserId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>, RepositoryError>;
}

#[async_trait]
pub trait ApplicationUsageRepository: Send + Sync {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ApplicationUsageRecord>, RepositoryError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BudgetLimits, RepositoryError>;
}

/// Write-once store of finished analyses.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn save(&self, result: &AnalysisResult) -> Result<AnalysisId, RepositoryError>;
    async fn find_by_id(&self, id: &AnalysisId)
        -> Result<Option<AnalysisResult>, RepositoryError>;
}
