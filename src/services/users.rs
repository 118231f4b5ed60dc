use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::User,
    storage::postgres::{self, with_deadline, READ_DEADLINE, WRITE_DEADLINE},
};

/// Phone-keyed user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user for `phone`, creating it if absent, in one atomic step.
    ///
    /// A `Some` nickname replaces the stored one; `None` keeps it. Concurrent
    /// first calls for the same phone resolve to the same row.
    async fn get_or_create(&self, phone: &str, nickname: Option<&str>) -> AppResult<User>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn ping(&self) -> AppResult<()>;

    /// Current time according to the backing store.
    async fn server_time(&self) -> AppResult<DateTime<Utc>>;
}

/// Maps a submitted nickname to an update: empty input means "leave unchanged".
/// Anything else, whitespace included, is stored exactly as sent.
pub fn submitted_nickname(raw: Option<&str>) -> Option<&str> {
    raw.filter(|n| !n.is_empty())
}

#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_or_create(&self, phone: &str, nickname: Option<&str>) -> AppResult<User> {
        // Conflict on the phone constraint turns the insert into an update of
        // the existing row, so racing first logins share one id.
        let query = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO app_users (id, phone, nickname, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (phone) DO UPDATE
            SET nickname = COALESCE(EXCLUDED.nickname, app_users.nickname),
                updated_at = NOW()
            RETURNING id, phone, nickname, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(nickname)
        .fetch_one(&self.db);

        with_deadline("get_or_create_user", WRITE_DEADLINE, query).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let query = sqlx::query_as::<_, User>(
            "SELECT id, phone, nickname, created_at, updated_at FROM app_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db);

        with_deadline("find_user", READ_DEADLINE, query).await
    }

    async fn ping(&self) -> AppResult<()> {
        postgres::ping(&self.db).await
    }

    async fn server_time(&self) -> AppResult<DateTime<Utc>> {
        postgres::now(&self.db).await
    }
}
