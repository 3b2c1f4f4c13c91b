use sqlx::Row;

use clarity_core::domain::analysis::{AnalysisId, AnalysisResult};

use super::{decode_error, encode_timestamp, AnalysisRepository, RepositoryError};
use crate::DbPool;

/// Stores each analysis once as a JSON payload keyed by its id.
pub struct SqlAnalysisRepository {
    pool: DbPool,
}

impl SqlAnalysisRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn save_error(id: &AnalysisId, error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("analysis {id} already stored"))
        }
        _ => RepositoryError::Storage(error.to_string()),
    }
}

#[async_trait::async_trait]
impl AnalysisRepository for SqlAnalysisRepository {
    async fn save(&self, result: &AnalysisResult) -> Result<AnalysisId, RepositoryError> {
        let metadata = &result.metadata;
        let payload_json = serde_json::to_string(result).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO analyses (analysis_id, user_id, window_start, window_end,
                                   insight_count, recommendation_count, payload_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&metadata.analysis_id.0)
        .bind(&metadata.user_id.0)
        .bind(encode_timestamp(metadata.window.start))
        .bind(encode_timestamp(metadata.window.end))
        .bind(result.insights.len() as i64)
        .bind(result.recommendations.len() as i64)
        .bind(payload_json)
        .bind(encode_timestamp(metadata.created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| save_error(&metadata.analysis_id, error))?;

        Ok(metadata.analysis_id.clone())
    }

    async fn find_by_id(&self, id: &AnalysisId) -> Result<Option<AnalysisResult>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM analyses WHERE analysis_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(super::storage_error)?;

        match row {
            Some(ref r) => {
                let payload_json: String = r.try_get("payload_json").map_err(decode_error)?;
                Ok(Some(serde_json::from_str(&payload_json).map_err(decode_error)?))
            }
            None => Ok(None),
        }
    }
}
