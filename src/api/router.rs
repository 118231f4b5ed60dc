use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use super::{handlers, middleware::auth_middleware};
use crate::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router<AppState> {
    // Public auth routes
    let auth_routes = Router::new()
        .route("/request-code", post(handlers::auth::request_code))
        .route("/verify", post(handlers::auth::verify));

    // Protected routes
    let protected = Router::new()
        .route("/me", get(handlers::users::get_current_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/ping", get(handlers::health::ping))
        .route("/dbtime", get(handlers::health::db_time))
        .nest("/auth", auth_routes)
        .merge(protected)
        .with_state(state)
}

/// Full application: liveness and readiness at the root, API under `/api/v1`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/liveness", get(handlers::health::liveness))
        .route("/readiness", get(handlers::health::readiness))
        .nest("/api/v1", create_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, HeaderValue, Request, StatusCode},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::{AuthConfig, OtpConfig},
        services::{
            auth::AuthService,
            otp::OtpRecorder,
            token::{TokenIssuer, TokenValidator},
        },
        storage::memory::{InMemoryOtpLog, InMemoryUsers},
    };

    fn test_state(users: InMemoryUsers) -> AppState {
        let auth = AuthConfig {
            secret: "test-secret".to_string(),
            access_token_ttl: Duration::from_secs(3600),
        };
        let otp = OtpConfig {
            fixed_code: "000000".to_string(),
            expiry: Duration::from_secs(300),
        };
        let users = Arc::new(users);
        let recorder = OtpRecorder::new(Arc::new(InMemoryOtpLog::default()), &otp).unwrap();
        let issuer = TokenIssuer::new(&auth).unwrap();

        AppState {
            users: users.clone(),
            auth: Arc::new(AuthService::new(users, recorder, issuer, &otp)),
            validator: Arc::new(TokenValidator::new(&auth)),
        }
    }

    fn app() -> Router {
        build_app(test_state(InMemoryUsers::default()))
    }

    async fn post_json(app: &Router, path: &str, body: Value) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get_with_auth(app: &Router, path: &str, authorization: Option<&str>) -> Response {
        get_with_header(app, path, authorization.map(|v| HeaderValue::from_str(v).unwrap())).await
    }

    async fn get_with_header(
        app: &Router,
        path: &str,
        authorization: Option<HeaderValue>,
    ) -> Response {
        let mut request = Request::builder().uri(path);
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn request_code_returns_dev_hint() {
        let app = app();

        let response = post_json(
            &app,
            "/api/v1/auth/request-code",
            json!({ "phone": "+82 10-5555-4444", "purpose": "login" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["dev_hint_code"], "000000");
    }

    #[tokio::test]
    async fn request_code_rejects_invalid_phone() {
        let app = app();

        let response = post_json(
            &app,
            "/api/v1/auth/request-code",
            json!({ "phone": "abc!@#", "purpose": "login" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid phone format");
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let app = app();

        let missing_code = post_json(&app, "/api/v1/auth/verify", json!({ "phone": "123456" })).await;
        assert_eq!(missing_code.status(), StatusCode::BAD_REQUEST);

        let not_json = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/verify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_with_wrong_code_is_unauthorized() {
        let app = app();

        let response = post_json(
            &app,
            "/api/v1/auth/verify",
            json!({ "phone": "+82 10-1111-2222", "code": "999999" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid code");
    }

    #[tokio::test]
    async fn verify_creates_then_reuses_user() {
        let app = app();

        let first = post_json(
            &app,
            "/api/v1/auth/verify",
            json!({ "phone": "+82 10-9876-5432", "code": "000000", "nickname": "alice" }),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = json_body(first).await;
        assert_eq!(first["token_type"], "Bearer");
        assert!(first["access_token"].as_str().is_some_and(|t| !t.is_empty()));
        let expires_in = first["expires_in"].as_i64().unwrap();
        assert!(expires_in > 3590 && expires_in <= 3600);
        assert_eq!(first["user"]["phone"], "+82 10-9876-5432");
        assert_eq!(first["user"]["nickname"], "alice");
        let id = first["user"]["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());

        let second = post_json(
            &app,
            "/api/v1/auth/verify",
            json!({ "phone": "+82 10-9876-5432", "code": "000000" }),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);
        let second = json_body(second).await;
        assert_eq!(second["user"]["id"], id);
        assert_eq!(second["user"]["nickname"], "alice");
    }

    #[tokio::test]
    async fn verify_reports_storage_failure() {
        let app = build_app(test_state(InMemoryUsers::unavailable()));

        let response = post_json(
            &app,
            "/api/v1/auth/verify",
            json!({ "phone": "+82 10-9876-5432", "code": "000000" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer_token() {
        let app = app();

        for authorization in [None, Some("Basic abc"), Some("Bearer not-a-jwt")] {
            let response = get_with_auth(&app, "/api/v1/me", authorization).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(json_body(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn me_rejects_non_ascii_authorization_header() {
        let app = app();
        let value = HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap();

        let response = get_with_header(&app, "/api/v1/me", Some(value)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "malformed authorization header"
        );
    }

    #[tokio::test]
    async fn me_rejects_expired_token() {
        let app = app();
        let issuer = TokenIssuer::new(&AuthConfig {
            secret: "test-secret".to_string(),
            access_token_ttl: Duration::from_secs(3600),
        })
        .unwrap();
        let stale = issuer
            .issue_at(
                Uuid::new_v4(),
                "010-2222-3333",
                Utc::now() - chrono::Duration::hours(2),
            )
            .unwrap();

        let bearer = format!("Bearer {}", stale.access_token);
        let response = get_with_auth(&app, "/api/v1/me", Some(bearer.as_str())).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "token expired");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let app = app();
        let body = format!(r#"{{"phone":"123456","code":"{}"}}"#, "0".repeat(70_000));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/verify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn responses_carry_cors_headers() {
        let app = app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ping")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn dbtime_reports_storage_clock() {
        let response = get_with_auth(&app(), "/api/v1/dbtime", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let now = json_body(response).await["now"].as_str().unwrap().to_string();
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());

        let degraded = build_app(test_state(InMemoryUsers::unavailable()));
        let response = get_with_auth(&degraded, "/api/v1/dbtime", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn me_returns_identity_from_token() {
        let app = app();

        let login = post_json(
            &app,
            "/api/v1/auth/verify",
            json!({ "phone": "010-2222-3333", "code": "000000", "nickname": "bob" }),
        )
        .await;
        let login = json_body(login).await;
        let token = login["access_token"].as_str().unwrap();

        let bearer = format!("Bearer {}", token);
        let response = get_with_auth(&app, "/api/v1/me", Some(bearer.as_str())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let me = json_body(response).await;
        assert_eq!(me["id"], login["user"]["id"]);
        assert_eq!(me["phone"], "010-2222-3333");
        assert_eq!(me["nickname"], "bob");
    }

    #[tokio::test]
    async fn health_checks_report_storage_state() {
        let healthy = app();
        let response = get_with_auth(&healthy, "/readiness", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get_with_auth(&healthy, "/liveness", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let degraded = build_app(test_state(InMemoryUsers::unavailable()));
        let response = get_with_auth(&degraded, "/readiness", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "degraded");

        let response = get_with_auth(&degraded, "/liveness", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
