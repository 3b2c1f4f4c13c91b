use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use clarity_core::domain::record::{ActivityRecord, AppCategory, ApplicationUsageRecord, UserId};

use super::{
    decode_error, decode_timestamp, encode_timestamp, storage_error, ActivityRepository,
    ApplicationUsageRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: &UserId,
        record: &ActivityRecord,
    ) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&record.metadata).map_err(decode_error)?;
        sqlx::query(
            "INSERT INTO activity (user_id, timestamp, duration_minutes, activity_type, metadata_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user_id.0)
        .bind(encode_timestamp(record.timestamp))
        .bind(record.duration_minutes)
        .bind(&record.activity_type)
        .bind(metadata_json)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> Result<ActivityRecord, RepositoryError> {
    let timestamp: String = row.try_get("timestamp").map_err(decode_error)?;
    let duration_minutes: f64 = row.try_get("duration_minutes").map_err(decode_error)?;
    let activity_type: String = row.try_get("activity_type").map_err(decode_error)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(decode_error)?;
    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).map_err(decode_error)?;

    Ok(ActivityRecord {
        timestamp: decode_timestamp(&timestamp)?,
        duration_minutes,
        activity_type,
        metadata,
    })
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT timestamp, duration_minutes, activity_type, metadata_json
             FROM activity
             WHERE user_id = ? AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(&user_id.0)
        .bind(encode_timestamp(start))
        .bind(encode_timestamp(end))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(row_to_activity).collect()
    }
}

pub struct SqlApplicationUsageRepository {
    pool: DbPool,
}

impl SqlApplicationUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: &UserId,
        record: &ApplicationUsageRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO application_usage
                 (user_id, timestamp, application_name, duration_minutes, category, is_active)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user_id.0)
        .bind(encode_timestamp(record.timestamp))
        .bind(&record.application_name)
        .bind(record.duration_minutes)
        .bind(record.category.as_str())
        .bind(record.is_active)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

fn row_to_usage(row: &sqlx::sqlite::SqliteRow) -> Result<ApplicationUsageRecord, RepositoryError> {
    let timestamp: String = row.try_get("timestamp").map_err(decode_error)?;
    let application_name: String = row.try_get("application_name").map_err(decode_error)?;
    let duration_minutes: f64 = row.try_get("duration_minutes").map_err(decode_error)?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let is_active: bool = row.try_get("is_active").map_err(decode_error)?;

    Ok(ApplicationUsageRecord {
        timestamp: decode_timestamp(&timestamp)?,
        application_name,
        duration_minutes,
        category: AppCategory::parse(&category).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown application category `{category}`"))
        })?,
        is_active,
    })
}

#[async_trait::async_trait]
impl ApplicationUsageRepository for SqlApplicationUsageRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ApplicationUsageRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT timestamp, application_name, duration_minutes, category, is_active
             FROM application_usage
             WHERE user_id = ? AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(&user_id.0)
        .bind(encode_timestamp(start))
        .bind(encode_timestamp(end))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(row_to_usage).collect()
    }
}
