//! Fetchers pull one domain's records for a window and shape them into its table.

use std::sync::Arc;

use super::behavior::BehaviorData;
use super::financial::FinancialData;
use super::temporal::TemporalData;
use crate::config::{BehaviorThresholds, TemporalThresholds};
use crate::domain::analysis::AnalysisWindow;
use crate::domain::pattern::PatternDomain;
use crate::domain::record::UserId;
use crate::errors::AnalysisError;
use crate::repository::{
    ActivityRepository, ApplicationUsageRepository, BudgetRepository, RepositoryError,
    TransactionRepository,
};

fn fetch_error(domain: PatternDomain) -> impl FnOnce(RepositoryError) -> AnalysisError {
    move |source| AnalysisError::Fetch { domain, source }
}

#[derive(Clone)]
pub struct BehaviorFetcher {
    activities: Arc<dyn ActivityRepository>,
    usage: Arc<dyn ApplicationUsageRepository>,
    thresholds: BehaviorThresholds,
}

impl BehaviorFetcher {
    pub fn new(
        activities: Arc<dyn ActivityRepository>,
        usage: Arc<dyn ApplicationUsageRepository>,
        thresholds: BehaviorThresholds,
    ) -> Self {
        Self { activities, usage, thresholds }
    }

    pub async fn fetch(
        &self,
        user_id: &UserId,
        window: AnalysisWindow,
    ) -> Result<BehaviorData, AnalysisError> {
        let (activities, usage) = tokio::try_join!(
            self.activities.fetch(user_id, window.start, window.end),
            self.usage.fetch(user_id, window.start, window.end),
        )
        .map_err(fetch_error(PatternDomain::Behavior))?;

        tracing::debug!(
            event_name = "analysis.fetch.behavior",
            user_id = %user_id,
            activities = activities.len(),
            application_usage = usage.len(),
            "behavior records fetched"
        );
        Ok(BehaviorData::from_records(window, activities, usage, &self.thresholds))
    }
}

#[derive(Clone)]
pub struct FinancialFetcher {
    transactions: Arc<dyn TransactionRepository>,
    budgets: Arc<dyn BudgetRepository>,
}

impl FinancialFetcher {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        budgets: Arc<dyn BudgetRepository>,
    ) -> Self {
        Self { transactions, budgets }
    }

    pub async fn fetch(
        &self,
        user_id: &UserId,
        window: AnalysisWindow,
    ) -> Result<FinancialData, AnalysisError> {
        let (transactions, limits) = tokio::try_join!(
            self.transactions.fetch(user_id, window.start, window.end),
            self.budgets.fetch(user_id, window.start, window.end),
        )
        .map_err(fetch_error(PatternDomain::Financial))?;

        tracing::debug!(
            event_name = "analysis.fetch.financial",
            user_id = %user_id,
            transactions = transactions.len(),
            budgets = limits.len(),
            "financial records fetched"
        );
        Ok(FinancialData::from_records(window, transactions, limits))
    }
}

#[derive(Clone)]
pub struct TemporalFetcher {
    activities: Arc<dyn ActivityRepository>,
    thresholds: TemporalThresholds,
}

impl TemporalFetcher {
    pub fn new(activities: Arc<dyn ActivityRepository>, thresholds: TemporalThresholds) -> Self {
        Self { activities, thresholds }
    }

    pub async fn fetch(
        &self,
        user_id: &UserId,
        window: AnalysisWindow,
    ) -> Result<TemporalData, AnalysisError> {
        let activities = self
            .activities
            .fetch(user_id, window.start, window.end)
            .await
            .map_err(fetch_error(PatternDomain::Temporal))?;

        tracing::debug!(
            event_name = "analysis.fetch.temporal",
            user_id = %user_id,
            activities = activities.len(),
            "temporal records fetched"
        );
        Ok(TemporalData::from_records(window, activities, &self.thresholds))
    }
}
