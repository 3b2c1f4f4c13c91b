use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single block of tracked time. Owned by the analysis request once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub duration_minutes: f64,
    pub activity_type: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ActivityRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        duration_minutes: f64,
        activity_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            duration_minutes,
            activity_type: activity_type.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.timestamp.checked_add_signed(minutes(self.duration_minutes)).unwrap_or(self.timestamp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppCategory {
    Development,
    Communication,
    Browsing,
    SocialMedia,
    Entertainment,
    Other,
}

impl AppCategory {
    pub const ALL: [AppCategory; 6] = [
        AppCategory::Development,
        AppCategory::Communication,
        AppCategory::Browsing,
        AppCategory::SocialMedia,
        AppCategory::Entertainment,
        AppCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Communication => "communication",
            Self::Browsing => "browsing",
            Self::SocialMedia => "social_media",
            Self::Entertainment => "entertainment",
            Self::Other => "other",
        }
    }

    /// Weight of time spent in this category when scoring productivity.
    pub fn productivity_weight(self) -> f64 {
        match self {
            Self::Development => 0.9,
            Self::Communication => 0.6,
            Self::Browsing => 0.4,
            Self::SocialMedia => 0.2,
            Self::Entertainment => 0.1,
            Self::Other => 0.0,
        }
    }

    pub fn is_distraction(self) -> bool {
        matches!(self, Self::SocialMedia | Self::Entertainment)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUsageRecord {
    pub timestamp: DateTime<Utc>,
    pub application_name: String,
    pub duration_minutes: f64,
    pub category: AppCategory,
    pub is_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingCategory {
    Essential,
    Investment,
    Discretionary,
    Debt,
    Other,
}

impl SpendingCategory {
    pub const ALL: [SpendingCategory; 5] = [
        SpendingCategory::Essential,
        SpendingCategory::Investment,
        SpendingCategory::Discretionary,
        SpendingCategory::Debt,
        SpendingCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Investment => "investment",
            Self::Discretionary => "discretionary",
            Self::Debt => "debt",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Expense,
    Income,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "expense" => Some(Self::Expense),
            "income" => Some(Self::Income),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    /// Signed amount as recorded by the source account.
    pub amount: Decimal,
    pub category: SpendingCategory,
    pub transaction_type: TransactionType,
    pub merchant: String,
}

impl TransactionRecord {
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    /// Spend magnitude, regardless of the sign convention of the source.
    pub fn spend(&self) -> Decimal {
        self.amount.abs()
    }
}

pub type BudgetLimits = BTreeMap<SpendingCategory, Decimal>;

/// Non-finite or negative lengths collapse to zero; analyzers reject them separately.
pub(crate) fn minutes(value: f64) -> Duration {
    if !value.is_finite() || value <= 0.0 {
        return Duration::zero();
    }
    Duration::try_milliseconds((value * 60_000.0).round() as i64).unwrap_or(Duration::zero())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{ActivityRecord, AppCategory, SpendingCategory, TransactionRecord, TransactionType};

    #[test]
    fn activity_end_adds_fractional_minutes() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("timestamp");
        let record = ActivityRecord::new(start, 1.5, "coding");

        assert_eq!(record.ends_at(), start + chrono::Duration::seconds(90));
    }

    #[test]
    fn category_names_round_trip_through_parse() {
        for category in AppCategory::ALL {
            assert_eq!(AppCategory::parse(category.as_str()), Some(category));
        }
        for category in SpendingCategory::ALL {
            assert_eq!(SpendingCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(AppCategory::parse("gaming"), None);
    }

    #[test]
    fn spend_ignores_sign_convention() {
        let record = TransactionRecord {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            amount: Decimal::new(-4250, 2),
            category: SpendingCategory::Essential,
            transaction_type: TransactionType::Expense,
            merchant: "Grocer".to_string(),
        };

        assert!(record.is_expense());
        assert_eq!(record.spend(), Decimal::new(4250, 2));
    }
}
