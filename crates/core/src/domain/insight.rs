use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::recommendation::RecommendationType;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsightId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Behavior,
    Financial,
    Temporal,
    BehaviorFinancial,
    TemporalFinancial,
    BehaviorTemporal,
}

impl InsightType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Behavior => "behavior",
            Self::Financial => "financial",
            Self::Temporal => "temporal",
            Self::BehaviorFinancial => "behavior_financial",
            Self::TemporalFinancial => "temporal_financial",
            Self::BehaviorTemporal => "behavior_temporal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Focus,
    PeakFocusHours,
    Productivity,
    AppUsage,
    WorkRoutine,
    Breaks,
    Distraction,
    Spending,
    Budget,
    RecurringPayments,
    DailyRhythm,
    PeakHours,
    WeeklyRhythm,
    WorkLifeBalance,
    TimeBlocks,
    ProductivitySpending,
    ScheduleSpending,
    FocusTiming,
}

impl InsightCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::PeakFocusHours => "peak_focus_hours",
            Self::Productivity => "productivity",
            Self::AppUsage => "app_usage",
            Self::WorkRoutine => "work_routine",
            Self::Breaks => "breaks",
            Self::Distraction => "distraction",
            Self::Spending => "spending",
            Self::Budget => "budget",
            Self::RecurringPayments => "recurring_payments",
            Self::DailyRhythm => "daily_rhythm",
            Self::PeakHours => "peak_hours",
            Self::WeeklyRhythm => "weekly_rhythm",
            Self::WorkLifeBalance => "work_life_balance",
            Self::TimeBlocks => "time_blocks",
            Self::ProductivitySpending => "productivity_spending",
            Self::ScheduleSpending => "schedule_spending",
            Self::FocusTiming => "focus_timing",
        }
    }

    /// Recommendation builder responsible for insights of this category.
    pub fn group(self) -> RecommendationType {
        match self {
            Self::Focus
            | Self::PeakFocusHours
            | Self::Productivity
            | Self::AppUsage
            | Self::Breaks
            | Self::Distraction => RecommendationType::Productivity,
            Self::Spending
            | Self::Budget
            | Self::RecurringPayments
            | Self::ProductivitySpending
            | Self::ScheduleSpending => RecommendationType::Financial,
            Self::WorkRoutine
            | Self::DailyRhythm
            | Self::PeakHours
            | Self::WeeklyRhythm
            | Self::WorkLifeBalance
            | Self::TimeBlocks
            | Self::FocusTiming => RecommendationType::TimeManagement,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn score(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub insight_type: InsightType,
    pub category: InsightCategory,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Insight {
    pub fn new(
        insight_type: InsightType,
        category: InsightCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        Self {
            id: Self::fingerprint(insight_type, category, &title),
            insight_type,
            category,
            title,
            description: description.into(),
            severity,
            confidence,
            metadata: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stable identity of an insight: equal (type, category, title) always hash the same.
    pub fn fingerprint(
        insight_type: InsightType,
        category: InsightCategory,
        title: &str,
    ) -> InsightId {
        let mut hasher = Sha256::new();
        hasher.update(insight_type.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(category.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(title.as_bytes());
        let digest = hasher.finalize();
        InsightId(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Insight, InsightCategory, InsightType, Severity};
    use crate::domain::recommendation::RecommendationType;

    #[test]
    fn fingerprint_depends_on_type_category_and_title_only() {
        let now = Utc::now();
        let a = Insight::new(
            InsightType::Behavior,
            InsightCategory::Focus,
            "Low focus time",
            "first",
            Severity::High,
            0.9,
            now,
        );
        let b = Insight::new(
            InsightType::Behavior,
            InsightCategory::Focus,
            "Low focus time",
            "second",
            Severity::Low,
            0.1,
            now,
        );
        let c = Insight::new(
            InsightType::Temporal,
            InsightCategory::Focus,
            "Low focus time",
            "first",
            Severity::High,
            0.9,
            now,
        );

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.0.len(), 64);
    }

    #[test]
    fn severity_scores_are_ordered() {
        assert!(Severity::High.score() > Severity::Medium.score());
        assert!(Severity::Medium.score() > Severity::Low.score());
    }

    #[test]
    fn categories_route_to_recommendation_groups() {
        assert_eq!(InsightCategory::Focus.group(), RecommendationType::Productivity);
        assert_eq!(InsightCategory::Budget.group(), RecommendationType::Financial);
        assert_eq!(InsightCategory::DailyRhythm.group(), RecommendationType::TimeManagement);
    }
}
