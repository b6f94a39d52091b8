use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::services::{hash_password, is_valid_email, verify_password},
    auth::AuthUser,
    media::try_upload,
    state::AppState,
    store::{StoreError, UserProfile, UserUpdate},
};

use super::dto::{MessageResponse, PasswordChangeRequest, UserSearchQuery};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account", get(get_account).put(update_account))
        .route("/account/password", post(change_password))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024)) // avatar uploads
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", get(search_users))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    match state.store.find_user_by_id(user_id).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        // 404 tells the client its session points at a deleted account.
        Ok(None) => Err(StoreError::user_not_found().response()),
        Err(e) => Err(e.response()),
    }
}

/// PUT /account (multipart): fullname and email are required text fields;
/// `avatar` is an optional file, `avatar_url` an optional text field whose
/// empty value clears the stored avatar. Without either the avatar stays
/// as it is.
#[instrument(skip(state, mp))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let mut fullname: Option<String> = None;
    let mut email: Option<String> = None;
    let mut avatar: Option<Option<String>> = None;

    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("fullname") => fullname = Some(field.text().await.map_err(bad_request)?),
            Some("email") => email = Some(field.text().await.map_err(bad_request)?),
            Some("avatar") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await.map_err(bad_request)?;
                if !data.is_empty() {
                    // Best effort: a failed upload keeps the current avatar.
                    if let Some(url) =
                        try_upload(state.media.as_deref(), "avatars", &content_type, data).await
                    {
                        avatar = Some(Some(url));
                    }
                }
            }
            Some("avatar_url") => {
                let value = field.text().await.map_err(bad_request)?;
                let trimmed = value.trim();
                avatar = if trimmed.is_empty() {
                    Some(None)
                } else {
                    Some(Some(trimmed.to_string()))
                };
            }
            _ => {}
        }
    }

    let fullname = fullname.map(|v| v.trim().to_string()).unwrap_or_default();
    let email = email
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_default();
    if fullname.is_empty() || email.is_empty() {
        warn!(user_id = %user_id, "profile update missing fields");
        return Err((
            StatusCode::BAD_REQUEST,
            "Fullname and email are required".into(),
        ));
    }
    if !is_valid_email(&email) {
        warn!(user_id = %user_id, email = %email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let profile = state
        .store
        .update_user(
            user_id,
            UserUpdate {
                fullname,
                email,
                avatar_url: avatar,
            },
        )
        .await
        .map_err(|e| e.response())?;

    info!(user_id = %user_id, "profile updated");
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    if payload.new_password.len() < 8 {
        warn!(user_id = %user_id, "new password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let user = match state.store.find_user_by_id_with_password(user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(StoreError::user_not_found().response()),
        Err(e) => return Err(e.response()),
    };

    let ok = match verify_password(&payload.current_password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = %user_id, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };
    if !ok {
        warn!(user_id = %user_id, "password change with wrong current password");
        return Err((
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect".into(),
        ));
    }

    let hash = hash_password(&payload.new_password)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state
        .store
        .update_user_password(user_id, &hash)
        .await
        .map_err(|e| e.response())?;

    info!(user_id = %user_id, "password updated");
    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Vec<UserProfile>>, (StatusCode, String)> {
    let Some(term) = query.search else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Search parameter is required".into(),
        ));
    };
    let users = state
        .store
        .find_users_by_name(&term)
        .await
        .map_err(|e| e.response())?;
    Ok(Json(users))
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
