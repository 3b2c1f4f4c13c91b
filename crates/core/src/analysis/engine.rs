//! The analysis pipeline: fetch, analyze, correlate, interpret, score and persist.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::behavior::{BehaviorAnalyzer, BehaviorData};
use super::correlation::PatternCorrelator;
use super::events::{AnalysisEventSink, AnalysisStage, StageTracker, TracingEventSink};
use super::fetch::{BehaviorFetcher, FinancialFetcher, TemporalFetcher};
use super::financial::{FinancialAnalyzer, FinancialData};
use super::insights::InsightGenerator;
use super::recommendations::RecommendationGenerator;
use super::scoring::pattern_scores;
use super::temporal::{TemporalAnalyzer, TemporalData};
use super::DomainAnalyzer;
use crate::config::AnalysisConfig;
use crate::domain::analysis::{
    AnalysisId, AnalysisMetadata, AnalysisResult, AnalysisWindow, DataWarning, RawDataSnapshot,
    RecordCounts,
};
use crate::domain::pattern::{Pattern, PatternDomain};
use crate::domain::record::UserId;
use crate::errors::AnalysisError;
use crate::repository::{
    ActivityRepository, AnalysisRepository, ApplicationUsageRepository, BudgetRepository,
    TransactionRepository,
};

#[derive(Clone)]
pub struct AnalysisRepositories {
    pub activities: Arc<dyn ActivityRepository>,
    pub application_usage: Arc<dyn ApplicationUsageRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub budgets: Arc<dyn BudgetRepository>,
    pub analyses: Arc<dyn AnalysisRepository>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub user_id: UserId,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub include_raw_data: bool,
}

impl AnalysisRequest {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, start: None, end: None, include_raw_data: false }
    }

    pub fn with_window(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.with_start(start).with_end(end)
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_raw_data(mut self, include: bool) -> Self {
        self.include_raw_data = include;
        self
    }

    /// Missing bounds default to a trailing `default_days` window ending at `now`.
    pub fn resolve_window(
        &self,
        default_days: u32,
        now: DateTime<Utc>,
    ) -> Result<AnalysisWindow, AnalysisError> {
        let end = self.end.unwrap_or(now);
        let start = self.start.unwrap_or_else(|| end - Duration::days(i64::from(default_days)));
        if start >= end {
            return Err(AnalysisError::InvalidDateRange { start, end });
        }
        Ok(AnalysisWindow { start, end })
    }
}

struct DomainPatterns {
    behavior: Vec<Pattern>,
    financial: Vec<Pattern>,
    temporal: Vec<Pattern>,
}

impl DomainPatterns {
    fn total(&self) -> usize {
        self.behavior.len() + self.financial.len() + self.temporal.len()
    }
}

pub struct InsightAnalyzer {
    config: AnalysisConfig,
    analyses: Arc<dyn AnalysisRepository>,
    behavior_fetcher: BehaviorFetcher,
    financial_fetcher: FinancialFetcher,
    temporal_fetcher: TemporalFetcher,
    correlator: PatternCorrelator,
    insights: InsightGenerator,
    recommendations: RecommendationGenerator,
    events: Arc<dyn AnalysisEventSink>,
}

impl InsightAnalyzer {
    pub fn new(config: AnalysisConfig, repositories: AnalysisRepositories) -> Self {
        Self {
            behavior_fetcher: BehaviorFetcher::new(
                repositories.activities.clone(),
                repositories.application_usage,
                config.behavior.clone(),
            ),
            financial_fetcher: FinancialFetcher::new(
                repositories.transactions,
                repositories.budgets,
            ),
            temporal_fetcher: TemporalFetcher::new(
                repositories.activities,
                config.temporal.clone(),
            ),
            correlator: PatternCorrelator::new(config.clone()),
            insights: InsightGenerator::new(config.clone()),
            recommendations: RecommendationGenerator::new(),
            analyses: repositories.analyses,
            events: Arc::new(TracingEventSink),
            config,
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn AnalysisEventSink>) -> Self {
        self.events = events;
        self
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let window = request.resolve_window(self.config.default_window_days, Utc::now())?;
        let analysis_id = AnalysisId(Uuid::new_v4().to_string());
        let mut tracker =
            StageTracker::new(analysis_id.clone(), request.user_id.clone(), self.events.clone());

        match self.run(&request, window, analysis_id, &mut tracker).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(
                    event_name = "analysis.failed",
                    user_id = %request.user_id,
                    stage = tracker.current().as_str(),
                    error_class = error.error_class(),
                    error = %error,
                    "analysis failed"
                );
                tracker.fail(&error);
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        window: AnalysisWindow,
        analysis_id: AnalysisId,
        tracker: &mut StageTracker,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let user_id = &request.user_id;

        tracker.advance_with(
            AnalysisStage::Fetching,
            BTreeMap::from([
                ("window_start".to_string(), window.start.to_rfc3339()),
                ("window_end".to_string(), window.end.to_rfc3339()),
            ]),
        )?;
        let (behavior, financial, temporal) = tokio::try_join!(
            self.behavior_fetcher.fetch(user_id, window),
            self.financial_fetcher.fetch(user_id, window),
            self.temporal_fetcher.fetch(user_id, window),
        )?;
        let record_counts = RecordCounts {
            activities: behavior.activities.len(),
            application_usage: behavior.usage.len(),
            transactions: financial.transactions.len(),
            budgets: financial.budgets.len(),
        };
        let warnings = self.data_warnings(&record_counts);
        for warning in &warnings {
            tracing::warn!(
                event_name = "analysis.insufficient_data",
                analysis_id = %analysis_id,
                user_id = %user_id,
                domain = warning.domain.as_str(),
                records = warning.records,
                required = warning.required,
                "{warning}"
            );
        }

        tracker.advance(AnalysisStage::Analyzing)?;
        let raw_data = request.include_raw_data.then(|| {
            RawDataSnapshot::anonymize(
                &behavior.activities,
                &behavior.usage,
                &financial.transactions,
            )
        });
        let patterns = self.analyze_domains(behavior, financial, temporal).await?;

        tracker.advance_with(
            AnalysisStage::Correlating,
            BTreeMap::from([("patterns".to_string(), patterns.total().to_string())]),
        )?;
        let combined =
            self.correlator.combine(&patterns.behavior, &patterns.financial, &patterns.temporal);

        tracker.advance(AnalysisStage::GeneratingInsights)?;
        let insights = self.insights.generate_insights(&combined);

        tracker.advance(AnalysisStage::GeneratingRecommendations)?;
        let recommendations = self.recommendations.generate_recommendations(&insights);

        tracker.advance(AnalysisStage::Scoring)?;
        let scores = pattern_scores(&combined, &self.config.weights);

        tracker.advance(AnalysisStage::Persisting)?;
        let result = AnalysisResult {
            metadata: AnalysisMetadata {
                analysis_id,
                user_id: user_id.clone(),
                window,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                total_patterns_analyzed: combined.len(),
                total_insights_generated: insights.len(),
                total_recommendations_generated: recommendations.len(),
                record_counts,
                warnings,
                created_at: Utc::now(),
            },
            insights,
            recommendations,
            pattern_scores: scores,
            raw_data,
        };
        let saved_id = self.analyses.save(&result).await.map_err(AnalysisError::Persistence)?;

        tracker.advance_with(
            AnalysisStage::Done,
            BTreeMap::from([
                ("insights".to_string(), result.insights.len().to_string()),
                ("recommendations".to_string(), result.recommendations.len().to_string()),
            ]),
        )?;
        tracing::info!(
            event_name = "analysis.completed",
            analysis_id = %saved_id,
            user_id = %user_id,
            duration_ms = result.metadata.duration_ms,
            insights = result.insights.len(),
            recommendations = result.recommendations.len(),
            "analysis completed"
        );
        Ok(result)
    }

    fn data_warnings(&self, counts: &RecordCounts) -> Vec<DataWarning> {
        let required = self.config.min_data_points;
        [
            (PatternDomain::Behavior, counts.activities),
            (PatternDomain::Financial, counts.transactions),
            (PatternDomain::Temporal, counts.activities),
        ]
        .into_iter()
        .filter(|(_, records)| *records < required)
        .map(|(domain, records)| DataWarning { domain, records, required })
        .collect()
    }

    async fn analyze_domains(
        &self,
        behavior: BehaviorData,
        financial: FinancialData,
        temporal: TemporalData,
    ) -> Result<DomainPatterns, AnalysisError> {
        let (behavior, financial, temporal) = tokio::try_join!(
            run_blocking(BehaviorAnalyzer::new(self.config.clone()), behavior),
            run_blocking(FinancialAnalyzer::new(self.config.clone()), financial),
            run_blocking(TemporalAnalyzer::new(self.config.clone()), temporal),
        )?;
        Ok(DomainPatterns { behavior, financial, temporal })
    }
}

async fn run_blocking<A: DomainAnalyzer>(
    analyzer: A,
    data: A::Data,
) -> Result<Vec<Pattern>, AnalysisError> {
    let domain = analyzer.domain();
    tokio::task::spawn_blocking(move || analyzer.analyze(&data))
        .await
        .map_err(|error| AnalysisError::TaskJoin { domain, message: error.to_string() })?
}
