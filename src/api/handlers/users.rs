use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult,
    models::{Identity, UserView},
    AppState,
};

/// Returns the caller's identity together with the stored nickname.
///
/// A user row that no longer exists is reported with a null nickname.
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Json<UserView>> {
    let nickname = state
        .users
        .find_by_id(identity.uid)
        .await?
        .and_then(|user| user.nickname);

    Ok(Json(UserView {
        id: identity.uid,
        phone: identity.phone,
        nickname,
    }))
}
