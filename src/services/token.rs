use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{Identity, IssuedToken},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    #[serde(default)]
    pub sub: String, // user_id
    #[serde(default)]
    pub phone: String,
    pub iat: i64, // issued at
    pub nbf: i64, // not before
    pub exp: i64, // expiry
}

/// Signs access tokens for verified users.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let ttl = Duration::from_std(config.access_token_ttl)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token ttl out of range: {}", e)))?;
        Ok(Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            ttl,
        })
    }

    pub fn issue(&self, user_id: Uuid, phone: &str) -> AppResult<IssuedToken> {
        self.issue_at(user_id, phone, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, phone: &str, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("token expiry out of range for ttl {}", self.ttl))
        })?;
        let claims = Claims {
            sub: user_id.to_string(),
            phone: phone.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token =
            encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(AppError::TokenSigning)?;

        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }
}

/// Verifies bearer tokens presented on protected routes.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Only HMAC signatures are accepted; the header's alg must be one of these.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Validates the raw `Authorization` header value.
    pub fn validate(&self, authorization: Option<&str>) -> AppResult<Identity> {
        let token = bearer_token(authorization)?;
        self.validate_token(token)
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => {
                    tracing::debug!("rejected token: {}", e);
                    AppError::InvalidToken
                }
            }
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AppError::InvalidToken);
        }
        let uid = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(Identity {
            uid,
            phone: claims.phone,
        })
    }
}

/// Extracts the credentials of a `Bearer` authorization header.
pub fn bearer_token(authorization: Option<&str>) -> AppResult<&str> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(AppError::MissingToken)?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AppError::MalformedAuthorization)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::MalformedAuthorization);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AppError::MalformedAuthorization);
    }
    Ok(token)
}
