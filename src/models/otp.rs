use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_PURPOSE: &str = "login";

/// Audit row for a passcode request. Never consulted by verification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OtpRequest {
    pub id: Uuid,
    pub phone: String,
    pub purpose: String,
    pub code_hint: String,
    pub expires_at: DateTime<Utc>,
    pub requester_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Where a passcode request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub ip: String,
    pub user_agent: String,
}
