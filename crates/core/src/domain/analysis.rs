use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::insight::Insight;
use crate::domain::pattern::PatternDomain;
use crate::domain::recommendation::Recommendation;
use crate::domain::record::{
    ActivityRecord, AppCategory, ApplicationUsageRecord, SpendingCategory, TransactionRecord,
    TransactionType, UserId,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub String);

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start.date_naive() && date <= self.end.date_naive()
    }

    pub fn days(&self) -> f64 {
        (self.end - self.start).num_minutes() as f64 / 1440.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternScores {
    pub productivity: f64,
    pub financial: f64,
    pub temporal: f64,
}

impl PatternScores {
    pub fn values(&self) -> [f64; 3] {
        [self.productivity, self.financial, self.temporal]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub activities: usize,
    pub application_usage: usize,
    pub transactions: usize,
    pub budgets: usize,
}

/// Non-fatal note that a domain had too little data for reliable patterns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWarning {
    pub domain: PatternDomain,
    pub records: usize,
    pub required: usize,
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient {} data: {} records (at least {} required)",
            self.domain, self.records, self.required
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_id: AnalysisId,
    pub user_id: UserId,
    pub window: AnalysisWindow,
    pub duration_ms: u64,
    pub total_patterns_analyzed: usize,
    pub total_insights_generated: usize,
    pub total_recommendations_generated: usize,
    pub record_counts: RecordCounts,
    pub warnings: Vec<DataWarning>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub pattern_scores: PatternScores,
    pub metadata: AnalysisMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<RawDataSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedActivity {
    pub timestamp: DateTime<Utc>,
    pub duration_minutes: f64,
    pub activity_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedUsage {
    pub timestamp: DateTime<Utc>,
    pub application: String,
    pub duration_minutes: f64,
    pub category: AppCategory,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: SpendingCategory,
    pub transaction_type: TransactionType,
    pub merchant: String,
}

/// Fetched records with identifying strings replaced by short digests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataSnapshot {
    pub activities: Vec<AnonymizedActivity>,
    pub application_usage: Vec<AnonymizedUsage>,
    pub transactions: Vec<AnonymizedTransaction>,
}

impl RawDataSnapshot {
    pub fn anonymize(
        activities: &[ActivityRecord],
        application_usage: &[ApplicationUsageRecord],
        transactions: &[TransactionRecord],
    ) -> Self {
        Self {
            activities: activities
                .iter()
                .map(|record| AnonymizedActivity {
                    timestamp: record.timestamp,
                    duration_minutes: record.duration_minutes,
                    activity_type: record.activity_type.clone(),
                })
                .collect(),
            application_usage: application_usage
                .iter()
                .map(|record| AnonymizedUsage {
                    timestamp: record.timestamp,
                    application: pseudonym(&record.application_name),
                    duration_minutes: record.duration_minutes,
                    category: record.category,
                    is_active: record.is_active,
                })
                .collect(),
            transactions: transactions
                .iter()
                .map(|record| AnonymizedTransaction {
                    date: record.date,
                    amount: record.amount,
                    category: record.category,
                    transaction_type: record.transaction_type,
                    merchant: pseudonym(&record.merchant),
                })
                .collect(),
        }
    }
}

fn pseudonym(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest.iter().take(6).map(|byte| format!("{byte:02x}")).collect()
}
