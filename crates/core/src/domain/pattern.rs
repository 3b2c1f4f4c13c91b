use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::record::{AppCategory, SpendingCategory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternDomain {
    Behavior,
    Financial,
    Temporal,
}

impl PatternDomain {
    pub const ALL: [PatternDomain; 3] =
        [PatternDomain::Behavior, PatternDomain::Financial, PatternDomain::Temporal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Behavior => "behavior",
            Self::Financial => "financial",
            Self::Temporal => "temporal",
        }
    }
}

impl fmt::Display for PatternDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySegment {
    EarlyMorning,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DaySegment {
    pub const ALL: [DaySegment; 5] = [
        DaySegment::EarlyMorning,
        DaySegment::Morning,
        DaySegment::Afternoon,
        DaySegment::Evening,
        DaySegment::Night,
    ];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=7 => Self::EarlyMorning,
            8..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// First and last hour of the segment; `Night` wraps past midnight.
    pub fn hour_range(self) -> (u32, u32) {
        match self {
            Self::EarlyMorning => (5, 7),
            Self::Morning => (8, 11),
            Self::Afternoon => (12, 16),
            Self::Evening => (17, 20),
            Self::Night => (21, 4),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EarlyMorning => "early morning",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BehaviorSignal {
    PeakFocusHours { peak_hour: u32, peak_duration_minutes: f64, session_count: usize },
    FocusDuration { average_minutes: f64, total_minutes: f64, session_count: usize },
    ProductivityScore { score: f64, focus_time_share: f64, context_switches_per_hour: f64 },
    ApplicationUsage { category: AppCategory, frequency_per_day: f64, average_minutes: f64 },
    ActiveHours { hours: Vec<u32>, peak_hour: u32 },
    BreakRhythm { average_minutes: f64, break_count: usize, consistency: f64 },
    PeakDistractionHours { hours: Vec<u32>, distraction_count: usize, total_minutes: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum FinancialSignal {
    SpendingVolatility { mean_daily: f64, std_dev: f64, max_daily: f64, min_daily: f64 },
    CategoryConcentration { category: SpendingCategory, share: f64, amount: Decimal },
    BudgetVariance { category: SpendingCategory, variance: f64, limit: Decimal, actual: Decimal },
    RecurringTransaction {
        merchant: String,
        average_interval_days: f64,
        average_amount: Decimal,
        transaction_count: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum TemporalSignal {
    DaySegmentConcentration { segment: DaySegment, share: f64, duration_minutes: f64 },
    PeakHours { hours: Vec<u32>, average_minutes: f64, peak_minutes: f64 },
    HighActivityDays { weekdays: Vec<u32>, average_minutes: f64 },
    WeekendVariation { weekday_average: f64, weekend_average: f64, relative_difference: f64 },
    ConsistentBlocks { average_minutes: f64, consistency: f64, block_count: usize },
    CommonStartTimes { hours: Vec<u32> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum PatternPayload {
    Behavior(BehaviorSignal),
    Financial(FinancialSignal),
    Temporal(TemporalSignal),
}

impl PatternPayload {
    /// Signals that carry their own evidence rule instead of the
    /// `min_data_points` column gate: a budget variance compares one total
    /// with one limit, and a recurring charge needs `recurring_min_transactions`.
    pub fn has_own_evidence_gate(&self) -> bool {
        matches!(
            self,
            Self::Financial(
                FinancialSignal::BudgetVariance { .. } | FinancialSignal::RecurringTransaction { .. }
            )
        )
    }

    pub fn domain(&self) -> PatternDomain {
        match self {
            Self::Behavior(_) => PatternDomain::Behavior,
            Self::Financial(_) => PatternDomain::Financial,
            Self::Temporal(_) => PatternDomain::Temporal,
        }
    }

    pub fn pattern_type(&self) -> &'static str {
        match self {
            Self::Behavior(signal) => match signal {
                BehaviorSignal::PeakFocusHours { .. } => "peak_focus_hours",
                BehaviorSignal::FocusDuration { .. } => "focus_duration",
                BehaviorSignal::ProductivityScore { .. } => "productivity_score",
                BehaviorSignal::ApplicationUsage { .. } => "application_usage",
                BehaviorSignal::ActiveHours { .. } => "active_hours",
                BehaviorSignal::BreakRhythm { .. } => "break_rhythm",
                BehaviorSignal::PeakDistractionHours { .. } => "peak_distraction_hours",
            },
            Self::Financial(signal) => match signal {
                FinancialSignal::SpendingVolatility { .. } => "spending_volatility",
                FinancialSignal::CategoryConcentration { .. } => "category_concentration",
                FinancialSignal::BudgetVariance { variance, .. } if *variance > 0.0 => {
                    "over_budget"
                }
                FinancialSignal::BudgetVariance { .. } => "under_budget",
                FinancialSignal::RecurringTransaction { .. } => "recurring_transaction",
            },
            Self::Temporal(signal) => match signal {
                TemporalSignal::DaySegmentConcentration { .. } => "day_segment",
                TemporalSignal::PeakHours { .. } => "peak_hours",
                TemporalSignal::HighActivityDays { .. } => "high_activity_days",
                TemporalSignal::WeekendVariation { .. } => "weekend_variation",
                TemporalSignal::ConsistentBlocks { .. } => "consistent_blocks",
                TemporalSignal::CommonStartTimes { .. } => "common_start_times",
            },
        }
    }
}

/// One statistical observation about a single data domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub description: String,
    pub strength: f64,
    pub confidence: f64,
    pub support: f64,
    /// Numeric column the pattern was derived from; its length is the sample size.
    pub observations: Vec<f64>,
    pub payload: PatternPayload,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub detected_at: DateTime<Utc>,
}

impl Pattern {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        payload: PatternPayload,
        observations: Vec<f64>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            strength: 0.0,
            confidence: 0.0,
            support: 0.0,
            observations,
            payload,
            attributes: BTreeMap::new(),
            detected_at,
        }
    }

    pub fn with_scores(mut self, strength: f64, confidence: f64, support: f64) -> Self {
        self.strength = strength;
        self.confidence = confidence;
        self.support = support;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn domain(&self) -> PatternDomain {
        self.payload.domain()
    }

    pub fn pattern_type(&self) -> &'static str {
        self.payload.pattern_type()
    }

    pub fn sample_size(&self) -> usize {
        self.observations.len()
    }

    pub fn meets_sample_gate(&self, min_data_points: usize) -> bool {
        self.payload.has_own_evidence_gate() || self.sample_size() >= min_data_points
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPair {
    BehaviorFinancial,
    TemporalFinancial,
    BehaviorTemporal,
}

impl DomainPair {
    /// Canonical pair for two distinct domains, independent of argument order.
    pub fn from_domains(a: PatternDomain, b: PatternDomain) -> Option<Self> {
        use PatternDomain::{Behavior, Financial, Temporal};

        match (a, b) {
            (Behavior, Financial) | (Financial, Behavior) => Some(Self::BehaviorFinancial),
            (Temporal, Financial) | (Financial, Temporal) => Some(Self::TemporalFinancial),
            (Behavior, Temporal) | (Temporal, Behavior) => Some(Self::BehaviorTemporal),
            _ => None,
        }
    }

    pub fn domains(self) -> (PatternDomain, PatternDomain) {
        match self {
            Self::BehaviorFinancial => (PatternDomain::Behavior, PatternDomain::Financial),
            Self::TemporalFinancial => (PatternDomain::Temporal, PatternDomain::Financial),
            Self::BehaviorTemporal => (PatternDomain::Behavior, PatternDomain::Temporal),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BehaviorFinancial => "behavior_financial",
            Self::TemporalFinancial => "temporal_financial",
            Self::BehaviorTemporal => "behavior_temporal",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationInfo {
    pub coefficient: f64,
    pub columns: (String, String),
    pub sample_size: usize,
    pub detected_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPattern {
    pub pair: DomainPair,
    pub strength: f64,
    pub patterns: BTreeMap<PatternDomain, Vec<Pattern>>,
    pub correlation: CorrelationInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinedPatternKind {
    BehaviorFinancial,
    TemporalFinancial,
    BehaviorTemporal,
    SingleDomain(PatternDomain),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombinedPattern {
    CrossDomain(CorrelatedPattern),
    SingleDomain(Pattern),
}

impl CombinedPattern {
    pub fn kind(&self) -> CombinedPatternKind {
        match self {
            Self::CrossDomain(correlated) => match correlated.pair {
                DomainPair::BehaviorFinancial => CombinedPatternKind::BehaviorFinancial,
                DomainPair::TemporalFinancial => CombinedPatternKind::TemporalFinancial,
                DomainPair::BehaviorTemporal => CombinedPatternKind::BehaviorTemporal,
            },
            Self::SingleDomain(pattern) => CombinedPatternKind::SingleDomain(pattern.domain()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CrossDomain(correlated) => correlated.pair.as_str(),
            Self::SingleDomain(pattern) => pattern.domain().as_str(),
        }
    }

    pub fn strength(&self) -> f64 {
        match self {
            Self::CrossDomain(correlated) => correlated.strength,
            Self::SingleDomain(pattern) => pattern.strength,
        }
    }

    /// Domain whose weight the pattern counts toward when scoring.
    pub fn primary_domain(&self) -> PatternDomain {
        match self {
            Self::CrossDomain(correlated) => correlated.pair.domains().0,
            Self::SingleDomain(pattern) => pattern.domain(),
        }
    }
}
