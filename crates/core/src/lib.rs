pub mod analysis;
pub mod config;
pub mod domain;
pub mod errors;
pub mod repository;

pub use analysis::{
    AnalysisEvent, AnalysisEventSink, AnalysisRepositories, AnalysisRequest, AnalysisStage,
    InMemoryEventSink, InsightAnalyzer, InsightGenerator, PatternCorrelator,
    RecommendationGenerator, TracingEventSink,
};
pub use config::{AnalysisConfig, AppConfig};
pub use domain::analysis::{AnalysisId, AnalysisResult, AnalysisWindow, PatternScores};
pub use domain::insight::{Insight, InsightCategory, InsightType, Severity};
pub use domain::pattern::{CombinedPattern, Pattern, PatternDomain};
pub use domain::recommendation::{Recommendation, RecommendationType};
pub use domain::record::{
    ActivityRecord, AppCategory, ApplicationUsageRecord, SpendingCategory, TransactionRecord,
    TransactionType, UserId,
};
pub use errors::AnalysisError;
pub use repository::RepositoryError;
