use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    models::{RequestOrigin, UserView},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    pub phone: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestCodeResponse {
    pub ok: bool,
    pub message: String,
    pub dev_hint_code: String,
}

pub async fn request_code(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<RequestCodeRequest>, JsonRejection>,
) -> AppResult<Json<RequestCodeResponse>> {
    let Json(req) = payload?;
    let origin = request_origin(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let hint = state
        .auth
        .request_code(&req.phone, req.purpose.as_deref(), origin)?;

    Ok(Json(RequestCodeResponse {
        ok: true,
        message: "verification code sent (dev: fixed code active)".to_string(),
        dev_hint_code: hint.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub access_token: String,
    pub expires_in: i64,
    pub user: UserView,
}

pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(req) = payload?;

    let (user, token) = state
        .auth
        .verify(&req.phone, &req.code, req.nickname.as_deref())
        .await?;

    let expires_in = (token.expires_at - Utc::now()).num_seconds().max(0);

    Ok(Json(TokenResponse {
        token_type: "Bearer",
        access_token: token.access_token,
        expires_in,
        user: user.into(),
    }))
}

/// Client address and user agent for the audit log. A forwarded address
/// takes precedence over the socket peer.
fn request_origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestOrigin {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let ip = match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => String::new(),
    };

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    RequestOrigin { ip, user_agent }
}
