//! Deterministic demo telemetry for local runs and tests.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

use clarity_core::domain::record::{
    ActivityRecord, AppCategory, ApplicationUsageRecord, SpendingCategory, TransactionRecord,
    TransactionType, UserId,
};

use crate::connection::DbPool;
use crate::repositories::{
    storage_error, RepositoryError, SqlActivityRepository, SqlApplicationUsageRepository,
    SqlBudgetRepository, SqlTransactionRepository,
};

pub const DEMO_DAYS: i64 = 14;

/// Two weeks of data ending the day before `now`.
///
/// Weekdays have a morning focus cluster, an afternoon meeting and a short
/// evening browse; weekends only the evening browse. Spending includes a
/// daily coffee, weekly groceries and discretionary purchases that overrun
/// their budget.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DemoDataset {
    pub activities: Vec<ActivityRecord>,
    pub application_usage: Vec<ApplicationUsageRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub budgets: Vec<(SpendingCategory, Decimal)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub user_id: String,
    pub activities: usize,
    pub application_usage: usize,
    pub transactions: usize,
    pub budgets: usize,
}

fn at(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let offset = Duration::hours(i64::from(hour)) + Duration::minutes(i64::from(minute));
    (day.and_time(NaiveTime::MIN) + offset).and_utc()
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

fn usage(
    timestamp: DateTime<Utc>,
    application_name: &str,
    duration_minutes: f64,
    category: AppCategory,
) -> ApplicationUsageRecord {
    ApplicationUsageRecord {
        timestamp,
        application_name: application_name.to_string(),
        duration_minutes,
        category,
        is_active: true,
    }
}

fn expense(
    date: NaiveDate,
    cents: i64,
    category: SpendingCategory,
    merchant: &str,
) -> TransactionRecord {
    TransactionRecord {
        date,
        amount: Decimal::new(cents, 2),
        category,
        transaction_type: TransactionType::Expense,
        merchant: merchant.to_string(),
    }
}

pub fn demo_dataset(now: DateTime<Utc>) -> DemoDataset {
    let today = now.date_naive();
    let mut data = DemoDataset {
        budgets: vec![
            (SpendingCategory::Essential, Decimal::new(400, 0)),
            (SpendingCategory::Discretionary, Decimal::new(100, 0)),
            (SpendingCategory::Debt, Decimal::new(250, 0)),
        ],
        ..DemoDataset::default()
    };

    for offset in (1..=DEMO_DAYS).rev() {
        let day = today - Duration::days(offset);
        let index = DEMO_DAYS - offset;

        if !is_weekend(day) {
            data.activities.push(ActivityRecord::new(at(day, 9, 0), 50.0, "coding"));
            data.activities.push(ActivityRecord::new(at(day, 9, 53), 45.0, "coding"));
            data.activities.push(ActivityRecord::new(at(day, 14, 0), 30.0, "meeting"));
            data.application_usage.extend([
                usage(at(day, 9, 0), "Editor", 95.0, AppCategory::Development),
                usage(at(day, 11, 0), "Mail", 20.0, AppCategory::Communication),
                usage(at(day, 14, 0), "Calls", 30.0, AppCategory::Communication),
            ]);
        }
        data.activities.push(ActivityRecord::new(at(day, 21, 0), 25.0, "browsing"));
        for (hour, minutes) in [(12, 8.0), (16, 6.0), (21, 15.0)] {
            data.application_usage.push(usage(
                at(day, hour, 0),
                "Feed",
                minutes,
                AppCategory::SocialMedia,
            ));
        }
        data.application_usage.push(usage(at(day, 21, 30), "Browser", 25.0, AppCategory::Browsing));

        data.transactions.push(expense(day, 450, SpendingCategory::Discretionary, "Corner Cafe"));
        if index % 7 == 0 {
            let cents = 8_500 + index * 150;
            data.transactions.push(expense(day, cents, SpendingCategory::Essential, "Grocer"));
        }
        if index % 5 == 2 {
            data.transactions.push(expense(
                day,
                3_999,
                SpendingCategory::Discretionary,
                "Bookshop",
            ));
        }
    }

    if let Some(first_day) = data.transactions.first().map(|record| record.date) {
        data.transactions.push(TransactionRecord {
            date: first_day,
            amount: Decimal::new(320_000, 2),
            category: SpendingCategory::Other,
            transaction_type: TransactionType::Income,
            merchant: "Employer".to_string(),
        });
    }

    data
}

/// Replaces any existing telemetry for `user_id` with the demo dataset.
pub async fn seed_demo_dataset(
    pool: &DbPool,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Result<SeedSummary, RepositoryError> {
    let data = demo_dataset(now);

    let mut tx = pool.begin().await.map_err(storage_error)?;
    for table in ["activity", "application_usage", "transactions", "budgets"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?"))
            .bind(&user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
    }
    tx.commit().await.map_err(storage_error)?;

    let activities = SqlActivityRepository::new(pool.clone());
    for record in &data.activities {
        activities.insert(user_id, record).await?;
    }
    let usage = SqlApplicationUsageRepository::new(pool.clone());
    for record in &data.application_usage {
        usage.insert(user_id, record).await?;
    }
    let transactions = SqlTransactionRepository::new(pool.clone());
    for record in &data.transactions {
        transactions.insert(user_id, record).await?;
    }
    let budgets = SqlBudgetRepository::new(pool.clone());
    for (category, limit) in &data.budgets {
        budgets.set_limit(user_id, *category, *limit).await?;
    }

    tracing::info!(
        event_name = "db.seed.completed",
        user_id = %user_id,
        activities = data.activities.len(),
        transactions = data.transactions.len(),
        "demo dataset seeded"
    );

    Ok(SeedSummary {
        user_id: user_id.0.clone(),
        activities: data.activities.len(),
        application_usage: data.application_usage.len(),
        transactions: data.transactions.len(),
        budgets: data.budgets.len(),
    })
}
