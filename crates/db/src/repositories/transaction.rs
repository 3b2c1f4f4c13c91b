use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use clarity_core::domain::record::{
    BudgetLimits, SpendingCategory, TransactionRecord, TransactionType, UserId,
};

use super::{
    decode_date, decode_error, encode_date, storage_error, BudgetRepository, RepositoryError,
    TransactionRepository,
};
use crate::DbPool;

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: &UserId,
        record: &TransactionRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO transactions (user_id, date, amount, category, transaction_type, merchant)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user_id.0)
        .bind(encode_date(record.date))
        .bind(record.amount.to_string())
        .bind(record.category.as_str())
        .bind(record.transaction_type.as_str())
        .bind(&record.merchant)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

fn parse_category(value: &str) -> Result<SpendingCategory, RepositoryError> {
    SpendingCategory::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown spending category `{value}`")))
}

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord, RepositoryError> {
    let date: String = row.try_get("date").map_err(decode_error)?;
    let amount: String = row.try_get("amount").map_err(decode_error)?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let transaction_type: String = row.try_get("transaction_type").map_err(decode_error)?;
    let merchant: String = row.try_get("merchant").map_err(decode_error)?;

    Ok(TransactionRecord {
        date: decode_date(&date)?,
        amount: Decimal::from_str(&amount).map_err(decode_error)?,
        category: parse_category(&category)?,
        transaction_type: TransactionType::parse(&transaction_type).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown transaction type `{transaction_type}`"))
        })?,
        merchant,
    })
}

#[async_trait::async_trait]
impl TransactionRepository for SqlTransactionRepository {
    /// Transactions are dated, so the window is applied to whole days, inclusive.
    async fn fetch(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT date, amount, category, transaction_type, merchant
             FROM transactions
             WHERE user_id = ? AND date >= ? AND date <= ?
             ORDER BY date ASC, id ASC",
        )
        .bind(&user_id.0)
        .bind(encode_date(start.date_naive()))
        .bind(encode_date(end.date_naive()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(row_to_transaction).collect()
    }
}

pub struct SqlBudgetRepository {
    pool: DbPool,
}

impl SqlBudgetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn set_limit(
        &self,
        user_id: &UserId,
        category: SpendingCategory,
        limit: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO budgets (user_id, category, limit_amount)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id, category) DO UPDATE SET
                 limit_amount = excluded.limit_amount",
        )
        .bind(&user_id.0)
        .bind(category.as_str())
        .bind(limit.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BudgetRepository for SqlBudgetRepository {
    /// Limits are standing per-category amounts and do not depend on the window.
    async fn fetch(
        &self,
        user_id: &UserId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BudgetLimits, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT category, limit_amount FROM budgets WHERE user_id = ?")
                .bind(&user_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;

        let mut limits = BudgetLimits::new();
        for row in &rows {
            let category: String = row.try_get("category").map_err(decode_error)?;
            let limit: String = row.try_get("limit_amount").map_err(decode_error)?;
            limits.insert(parse_category(&category)?, Decimal::from_str(&limit).map_err(decode_error)?);
        }
        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use clarity_core::domain::record::{
        SpendingCategory, TransactionRecord, TransactionType, UserId,
    };

    use super::{SqlBudgetRepository, SqlTransactionRepository};
    use crate::repositories::{BudgetRepository, RepositoryError, TransactionRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn transaction(day: u32, cents: i64) -> TransactionRecord {
        TransactionRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, day).expect("date"),
            amount: Decimal::new(cents, 2),
            category: SpendingCategory::Discretionary,
            transaction_type: TransactionType::Expense,
            merchant: "Bookshop".to_string(),
        }
    }

    #[tokio::test]
    async fn transactions_keep_exact_amounts_and_inclusive_dates() {
        let repo = SqlTransactionRepository::new(setup().await);
        let user = UserId::from("alice");
        for record in [transaction(1, 1999), transaction(15, -4250), transaction(31, 100)] {
            repo.insert(&user, &record).await.expect("insert");
        }
        let start = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).single().expect("start");
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).single().expect("end");

        let fetched = repo.fetch(&user, start, end).await.expect("fetch");

        assert_eq!(fetched, vec![transaction(15, -4250), transaction(31, 100)]);
    }

    #[tokio::test]
    async fn budget_limits_upsert_per_category() {
        let pool = setup().await;
        let repo = SqlBudgetRepository::new(pool.clone());
        let user = UserId::from("alice");
        repo.set_limit(&user, SpendingCategory::Discretionary, Decimal::new(400, 0))
            .await
            .expect("insert");
        repo.set_limit(&user, SpendingCategory::Discretionary, Decimal::new(500, 0))
            .await
            .expect("update");
        repo.set_limit(&UserId::from("bob"), SpendingCategory::Debt, Decimal::new(90, 0))
            .await
            .expect("other user");

        let now = Utc::now();
        let limits = repo.fetch(&user, now, now).await.expect("fetch");
        assert_eq!(limits.len(), 1);
        assert_eq!(limits.get(&SpendingCategory::Discretionary), Some(&Decimal::new(500, 0)));

        sqlx::query("UPDATE budgets SET limit_amount = 'lots' WHERE user_id = 'alice'")
            .execute(&pool)
            .await
            .expect("corrupt row");
        let error = repo.fetch(&user, now, now).await.expect_err("decode failure");
        assert!(matches!(error, RepositoryError::Decode(_)));
    }
}
