use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Every connection to `sqlite::memory:` opens its own empty database, so
/// in-memory URLs are pinned to a single connection that is never recycled.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = is_in_memory(database_url);
    let mut options = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { max_connections.max(1) })
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    if in_memory {
        options = options.idle_timeout(None).max_lifetime(None);
    }

    let pool = options
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                if !in_memory {
                    sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                }
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    tracing::debug!(
        event_name = "db.pool.connected",
        in_memory,
        max_connections = pool.options().get_max_connections(),
        "sqlite pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory};

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://clarity.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_database() {
        let pool = connect_with_settings("sqlite::memory:", 8, 30).await.expect("connect");
        sqlx::query("CREATE TABLE probe (id INTEGER)").execute(&pool).await.expect("create");

        sqlx::query("INSERT INTO probe (id) VALUES (1)").execute(&pool).await.expect("insert");

        assert_eq!(pool.options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn file_pool_creates_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("clarity.db").display());

        let pool = connect_with_settings(&url, 2, 30).await.expect("connect");

        assert_eq!(pool.options().get_max_connections(), 2);
        pool.close().await;
    }
}
