use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

/// Upper bound for single-row reads.
pub const READ_DEADLINE: Duration = Duration::from_secs(1);
/// Upper bound for writes, including upserts.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(2);
/// Upper bound for readiness pings.
pub const PING_DEADLINE: Duration = Duration::from_millis(500);

pub async fn connect(config: &DatabaseConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(5 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Database(e.into()))
}

/// Runs a storage future under a deadline. Expiry is reported as a storage
/// failure for `op`; nothing is retried.
pub async fn with_deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            tracing::warn!("{} exceeded {:?}", op, limit);
            Err(AppError::StorageTimeout(op))
        }
    }
}

pub async fn ping(pool: &PgPool) -> AppResult<()> {
    with_deadline("ping", PING_DEADLINE, async {
        sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
    })
    .await
}

/// Reads the database clock.
pub async fn now(pool: &PgPool) -> AppResult<DateTime<Utc>> {
    with_deadline(
        "db_time",
        READ_DEADLINE,
        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()").fetch_one(pool),
    )
    .await
}

#[cfg(test)]
pub(crate) async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&url)
        .await
        .ok()?;
    migrate(&pool).await.ok()?;
    Some(pool)
}
