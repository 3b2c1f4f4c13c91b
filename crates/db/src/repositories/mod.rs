//! SQLite and in-memory adapters for the analysis repository traits.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

pub use clarity_core::repository::{
    ActivityRepository, AnalysisRepository, ApplicationUsageRepository, BudgetRepository,
    RepositoryError, TransactionRepository,
};

pub mod activity;
pub mod analysis;
pub mod memory;
pub mod transaction;

pub use activity::{SqlActivityRepository, SqlApplicationUsageRepository};
pub use analysis::SqlAnalysisRepository;
pub use memory::{
    InMemoryActivityRepository, InMemoryAnalysisRepository, InMemoryApplicationUsageRepository,
    InMemoryBudgetRepository, InMemoryTransactionRepository,
};
pub use transaction::{SqlBudgetRepository, SqlTransactionRepository};

pub fn storage_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(error.to_string())
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// Fixed-width UTC text so lexical order matches time order in SQL comparisons.
pub(crate) fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}

pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(decode_error)
}
