//! In-process stand-ins for the Postgres-backed stores, used by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{OtpRequest, User},
    services::{otp::OtpRequestLog, users::UserDirectory},
};

#[derive(Default)]
pub struct InMemoryUsers {
    by_phone: Mutex<HashMap<String, User>>,
    unavailable: bool,
}

impl InMemoryUsers {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.by_phone.lock().unwrap().len()
    }

    fn check(&self, op: &'static str) -> AppResult<()> {
        if self.unavailable {
            return Err(AppError::StorageTimeout(op));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn get_or_create(&self, phone: &str, nickname: Option<&str>) -> AppResult<User> {
        self.check("get_or_create_user")?;
        let mut users = self.by_phone.lock().unwrap();
        let now = Utc::now();
        let user = users.entry(phone.to_string()).or_insert_with(|| User {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            nickname: None,
            created_at: now,
            updated_at: now,
        });
        if let Some(nickname) = nickname {
            user.nickname = Some(nickname.to_string());
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.check("find_user")?;
        let users = self.by_phone.lock().unwrap();
        Ok(users.values().find(|u| u.id == id).cloned())
    }

    async fn ping(&self) -> AppResult<()> {
        self.check("ping")
    }

    async fn server_time(&self) -> AppResult<DateTime<Utc>> {
        self.check("db_time")?;
        Ok(Utc::now())
    }
}

#[derive(Default)]
pub struct InMemoryOtpLog {
    entries: Mutex<Vec<OtpRequest>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl InMemoryOtpLog {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<OtpRequest> {
        self.entries.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OtpRequestLog for InMemoryOtpLog {
    async fn append(&self, entry: &OtpRequest) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AppError::StorageTimeout("append_otp_request"));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
