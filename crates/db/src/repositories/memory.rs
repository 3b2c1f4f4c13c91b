use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use clarity_core::domain::analysis::{AnalysisId, AnalysisResult};
use clarity_core::domain::record::{
    ActivityRecord, ApplicationUsageRecord, BudgetLimits, SpendingCategory, TransactionRecord,
    UserId,
};

use super::{
    ActivityRepository, AnalysisRepository, ApplicationUsageRepository, BudgetRepository,
    RepositoryError, TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryActivityRepository {
    records: RwLock<HashMap<UserId, Vec<ActivityRecord>>>,
}

impl InMemoryActivityRepository {
    pub async fn insert(&self, user_id: &UserId, record: ActivityRecord) {
        let mut records = self.records.write().await;
        records.entry(user_id.clone()).or_default().push(record);
    }

    pub async fn extend(&self, user_id: &UserId, batch: impl IntoIterator<Item = ActivityRecord>) {
        let mut records = self.records.write().await;
        records.entry(user_id.clone()).or_default().extend(batch);
    }
}

#[async_trait::async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<ActivityRecord> = records
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|record| record.timestamp >= start && record.timestamp < end)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.timestamp);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryApplicationUsageRepository {
    records: RwLock<HashMap<UserId, Vec<ApplicationUsageRecord>>>,
}

impl InMemoryApplicationUsageRepository {
    pub async fn insert(&self, user_id: &UserId, record: ApplicationUsageRecord) {
        let mut records = self.records.write().await;
        records.entry(user_id.clone()).or_default().push(record);
    }
}

#[async_trait::async_trait]
impl ApplicationUsageRepository for InMemoryApplicationUsageRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ApplicationUsageRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<ApplicationUsageRecord> = records
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|record| record.timestamp >= start && record.timestamp < end)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.timestamp);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    records: RwLock<HashMap<UserId, Vec<TransactionRecord>>>,
}

impl InMemoryTransactionRepository {
    pub async fn insert(&self, user_id: &UserId, record: TransactionRecord) {
        let mut records = self.records.write().await;
        records.entry(user_id.clone()).or_default().push(record);
    }

    pub async fn extend(
        &self,
        user_id: &UserId,
        batch: impl IntoIterator<Item = TransactionRecord>,
    ) {
        let mut records = self.records.write().await;
        records.entry(user_id.clone()).or_default().extend(batch);
    }
}

#[async_trait::async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let (first_day, last_day) = (start.date_naive(), end.date_naive());
        let records = self.records.read().await;
        let mut matching: Vec<TransactionRecord> = records
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|record| record.date >= first_day && record.date <= last_day)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.date);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryBudgetRepository {
    limits: RwLock<HashMap<UserId, BudgetLimits>>,
}

impl InMemoryBudgetRepository {
    pub async fn set_limit(&self, user_id: &UserId, category: SpendingCategory, limit: Decimal) {
        let mut limits = self.limits.write().await;
        limits.entry(user_id.clone()).or_default().insert(category, limit);
    }
}

#[async_trait::async_trait]
impl BudgetRepository for InMemoryBudgetRepository {
    async fn fetch(
        &self,
        user_id: &UserId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BudgetLimits, RepositoryError> {
        let limits = self.limits.read().await;
        Ok(limits.get(user_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryAnalysisRepository {
    results: RwLock<HashMap<String, AnalysisResult>>,
}

impl InMemoryAnalysisRepository {
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl AnalysisRepository for InMemoryAnalysisRepository {
    async fn save(&self, result: &AnalysisResult) -> Result<AnalysisId, RepositoryError> {
        let id = result.metadata.analysis_id.clone();
        let mut results = self.results.write().await;
        if results.contains_key(&id.0) {
            return Err(RepositoryError::Conflict(format!("analysis {id} already stored")));
        }
        results.insert(id.0.clone(), result.clone());
        Ok(id)
    }

    async fn find_by_id(&self, id: &AnalysisId) -> Result<Option<AnalysisResult>, RepositoryError> {
        let results = self.results.read().await;
        Ok(results.get(&id.0).cloned())
    }
}
