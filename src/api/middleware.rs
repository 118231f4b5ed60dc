use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, AppState};

/// Authentication middleware.
///
/// On success the verified [`crate::models::Identity`] is placed in the
/// request extensions; on failure the request ends with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str().map_err(|_| AppError::MalformedAuthorization))
        .transpose()?;

    let identity = state.validator.validate(authorization)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
