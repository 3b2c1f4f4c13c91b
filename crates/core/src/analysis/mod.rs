//! Pattern extraction, cross-domain correlation and insight synthesis.
//!
//! Each domain has a fetcher that shapes repository records into a table and an
//! analyzer that turns the table into [`Pattern`]s. The [`engine::InsightAnalyzer`]
//! runs them concurrently, correlates the results, and derives ranked insights
//! and recommendations.

pub mod behavior;
pub mod correlation;
pub mod engine;
pub mod events;
pub mod fetch;
pub mod financial;
pub mod insights;
pub mod recommendations;
pub mod scoring;
pub mod stats;
pub mod temporal;

pub use behavior::{BehaviorAnalyzer, BehaviorData, FocusSession, ProductivityMetrics};
pub use correlation::{CorrelationMatrix, PatternCorrelator};
pub use engine::{AnalysisRepositories, AnalysisRequest, InsightAnalyzer};
pub use events::{
    AnalysisEvent, AnalysisEventSink, AnalysisStage, InMemoryEventSink, StageOutcome,
    TracingEventSink,
};
pub use fetch::{BehaviorFetcher, FinancialFetcher, TemporalFetcher};
pub use financial::{BudgetStatus, FinancialAnalyzer, FinancialData};
pub use insights::InsightGenerator;
pub use recommendations::RecommendationGenerator;
pub use scoring::pattern_scores;
pub use temporal::{TemporalAnalyzer, TemporalData, TimeBlock};

use crate::domain::pattern::{Pattern, PatternDomain};
use crate::errors::AnalysisError;

/// Turns one domain's table into patterns. Implementations are pure and run on
/// the blocking pool.
pub trait DomainAnalyzer: Send + Sync + 'static {
    type Data: Send + 'static;

    fn domain(&self) -> PatternDomain;

    fn analyze(&self, data: &Self::Data) -> Result<Vec<Pattern>, AnalysisError>;
}

/// Drops patterns whose observation column is shorter than `min_data_points`,
/// except signals gated by their own evidence rule.
pub(crate) fn retain_supported(patterns: Vec<Pattern>, min_data_points: usize) -> Vec<Pattern> {
    patterns.into_iter().filter(|pattern| pattern.meets_sample_gate(min_data_points)).collect()
}

pub(crate) fn ensure_valid_minutes(
    domain: PatternDomain,
    what: &str,
    values: impl IntoIterator<Item = f64>,
) -> Result<(), AnalysisError> {
    for value in values {
        if !value.is_finite() || value < 0.0 {
            return Err(AnalysisError::analyzer(
                domain,
                format!("{what} has an invalid duration of {value} minutes"),
            ));
        }
    }
    Ok(())
}
