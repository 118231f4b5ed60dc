use std::sync::Arc;

use crate::{
    config::OtpConfig,
    error::{AppError, AppResult},
    models::{IssuedToken, RequestOrigin, User, DEFAULT_PURPOSE},
    services::{
        otp::OtpRecorder,
        phone::looks_like_phone,
        token::TokenIssuer,
        users::{submitted_nickname, UserDirectory},
    },
};

/// Phone login flow.
///
/// Every phone is challenged with the same configured code. There is no
/// per-request code and no expiry check; the audit log only records requests.
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    recorder: OtpRecorder,
    issuer: TokenIssuer,
    fixed_code: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        recorder: OtpRecorder,
        issuer: TokenIssuer,
        otp: &OtpConfig,
    ) -> Self {
        Self {
            users,
            recorder,
            issuer,
            fixed_code: otp.fixed_code.clone(),
        }
    }

    /// Accepts a code request and returns the development hint to echo back.
    ///
    /// The audit write runs detached and cannot fail the request.
    pub fn request_code(
        &self,
        phone: &str,
        purpose: Option<&str>,
        origin: RequestOrigin,
    ) -> AppResult<&str> {
        ensure_phone(phone)?;

        let purpose = purpose
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PURPOSE);
        self.recorder
            .record_detached(phone.to_string(), purpose.to_string(), origin);

        tracing::debug!("code requested for {} ({})", phone, purpose);
        Ok(self.fixed_code.as_str())
    }

    /// Checks the code, resolves the user and signs an access token.
    pub async fn verify(
        &self,
        phone: &str,
        code: &str,
        nickname: Option<&str>,
    ) -> AppResult<(User, IssuedToken)> {
        ensure_phone(phone)?;
        if code.is_empty() {
            return Err(AppError::BadRequest("code is required".to_string()));
        }
        if code != self.fixed_code {
            tracing::info!("rejected code for {}", phone);
            return Err(AppError::InvalidCode);
        }

        let user = self
            .users
            .get_or_create(phone, submitted_nickname(nickname))
            .await?;
        let token = self.issuer.issue(user.id, &user.phone)?;

        tracing::info!("user {} verified", user.id);
        Ok((user, token))
    }
}

fn ensure_phone(phone: &str) -> AppResult<()> {
    if looks_like_phone(phone) {
        Ok(())
    } else {
        Err(AppError::Validation("invalid phone format".to_string()))
    }
}
