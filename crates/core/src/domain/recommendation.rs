use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::insight::InsightId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Productivity,
    Financial,
    TimeManagement,
}

impl RecommendationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Productivity => "productivity",
            Self::Financial => "financial",
            Self::TimeManagement => "time_management",
        }
    }

    pub fn base_score(self) -> f64 {
        match self {
            Self::Productivity => 0.8,
            Self::Financial => 0.8,
            Self::TimeManagement => 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn modifier(self) -> f64 {
        match self {
            Self::Easy => 1.0,
            Self::Medium => 0.8,
            Self::Hard => 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub recommendation_type: RecommendationType,
    pub difficulty: Difficulty,
    pub source_insights: Vec<InsightId>,
    pub confidence_score: f64,
    pub impact_score: f64,
    pub priority_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl Recommendation {
    /// Impact is the type's base score scaled by difficulty; priority is impact times confidence.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        recommendation_type: RecommendationType,
        difficulty: Difficulty,
        source_insights: Vec<InsightId>,
        confidence_score: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let impact_score = recommendation_type.base_score() * difficulty.modifier();
        Self {
            title: title.into(),
            description: description.into(),
            recommendation_type,
            difficulty,
            source_insights,
            confidence_score,
            impact_score,
            priority_score: impact_score * confidence_score,
            timestamp,
        }
    }
}
