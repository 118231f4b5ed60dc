use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::OtpConfig,
    error::{AppError, AppResult},
    models::{OtpRequest, RequestOrigin},
    storage::postgres::{with_deadline, WRITE_DEADLINE},
};

/// Append-only audit trail of passcode requests.
#[async_trait]
pub trait OtpRequestLog: Send + Sync {
    async fn append(&self, entry: &OtpRequest) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgOtpRequestLog {
    db: PgPool,
}

impl PgOtpRequestLog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpRequestLog for PgOtpRequestLog {
    async fn append(&self, entry: &OtpRequest) -> AppResult<()> {
        let query = sqlx::query(
            r#"
            INSERT INTO otp_requests (id, phone, purpose, code_hint, expires_at, requester_ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.phone)
        .bind(&entry.purpose)
        .bind(&entry.code_hint)
        .bind(entry.expires_at)
        .bind(&entry.requester_ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.db);

        with_deadline("append_otp_request", WRITE_DEADLINE, query).await?;
        Ok(())
    }
}

/// Masks the configured code down to its last three characters.
pub fn code_hint(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() < 3 {
        return String::new();
    }
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("***{}", tail)
}

/// Writes audit rows for passcode requests.
#[derive(Clone)]
pub struct OtpRecorder {
    log: Arc<dyn OtpRequestLog>,
    code_hint: String,
    expiry: Duration,
}

impl OtpRecorder {
    pub fn new(log: Arc<dyn OtpRequestLog>, otp: &OtpConfig) -> AppResult<Self> {
        let expiry = Duration::from_std(otp.expiry)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("otp expiry out of range: {}", e)))?;
        Ok(Self {
            log,
            code_hint: code_hint(&otp.fixed_code),
            expiry,
        })
    }

    pub async fn record(&self, phone: &str, purpose: &str, origin: &RequestOrigin) -> AppResult<()> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.expiry).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("otp expiry out of range for {}", self.expiry))
        })?;
        let entry = OtpRequest {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            purpose: purpose.to_string(),
            code_hint: self.code_hint.clone(),
            expires_at,
            requester_ip: origin.ip.clone(),
            user_agent: origin.user_agent.clone(),
            created_at: now,
        };
        self.log.append(&entry).await
    }

    /// Records in the background. Failures are logged and dropped.
    pub fn record_detached(&self, phone: String, purpose: String, origin: RequestOrigin) {
        let recorder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.record(&phone, &purpose, &origin).await {
                tracing::warn!("failed to record otp request for {}: {}", phone, e);
            }
        });
    }
}
