use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::analysis::events::AnalysisStage;
use crate::domain::pattern::PatternDomain;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis window: start {start} must be before end {end}")]
    InvalidDateRange { start: DateTime<Utc>, end: DateTime<Utc> },
    #[error("failed to fetch {domain} data: {source}")]
    Fetch {
        domain: PatternDomain,
        #[source]
        source: RepositoryError,
    },
    #[error("{domain} analyzer failed: {message}")]
    Analyzer { domain: PatternDomain, message: String },
    #[error("{domain} analyzer task did not complete: {message}")]
    TaskJoin { domain: PatternDomain, message: String },
    #[error("invalid analysis stage transition from {from:?} to {to:?}")]
    InvalidStageTransition { from: AnalysisStage, to: AnalysisStage },
    #[error("failed to persist analysis result: {0}")]
    Persistence(#[source] RepositoryError),
}

impl AnalysisError {
    pub fn analyzer(domain: PatternDomain, message: impl Into<String>) -> Self {
        Self::Analyzer { domain, message: message.into() }
    }

    /// Stable label for callers that report failures as structured output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "analysis.invalid_window",
            Self::Fetch { .. } => "analysis.fetch",
            Self::Analyzer { .. } => "analysis.analyzer",
            Self::TaskJoin { .. } => "analysis.task",
            Self::InvalidStageTransition { .. } => "analysis.internal",
            Self::Persistence(_) => "analysis.persistence",
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidDateRange { .. })
    }
}

/// Failure inside a single insight builder; isolated from the rest of the batch.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InsightError {
    #[error("pattern `{pattern_type}` carries a non-finite {field}")]
    NonFinite { pattern_type: String, field: &'static str },
    #[error("correlated pattern is missing the {0} pattern table")]
    MissingTable(PatternDomain),
}

/// Failure inside a single recommendation builder; isolated from the other groups.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecommendationError {
    #[error("insight `{title}` carries a non-finite confidence")]
    NonFiniteConfidence { title: String },
}
