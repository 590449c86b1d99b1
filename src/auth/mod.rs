//! Session login, logout and identity endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::UserStatus;
use crate::core::shared::state::AppState;
use crate::security::auth::{session_id_from_headers, CurrentUser, RequestMeta};
use crate::security::session::SessionUser;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(username), Some(password), Some(role)) = (
        non_empty(req.username),
        non_empty(req.password),
        non_empty(req.role),
    ) else {
        return Err(ApiError::bad_request(
            "Username, password and role are required",
        ));
    };

    let store = state.store();
    let user = store
        .get_user_by_username(&username)
        .map_err(ApiError::internal("Internal server error"))?
        .ok_or(ApiError::BadCredentials)?;

    let verified = state
        .passwords
        .spawn_verify(&password, &user.password_hash)
        .await
        .unwrap_or_else(|e| {
            warn!("Unreadable password hash for user {}: {e}", user.id);
            false
        });
    if !verified {
        return Err(ApiError::BadCredentials);
    }

    if user.role.as_str() != role {
        return Err(ApiError::forbidden("Invalid role for this user"));
    }
    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }

    upgrade_password_hash(&state, user.id, &user.password_hash, &password).await;

    let session_user = SessionUser::from(&user);
    let session = state
        .sessions
        .create_session(
            session_user.clone(),
            meta.ip_address.clone(),
            meta.user_agent.as_deref(),
        )
        .await
        .map_err(|e| ApiError::unexpected("Internal server error", e))?;

    activity::record(
        store,
        Some(user.id),
        "login",
        serde_json::json!({ "role": user.role }),
        &meta,
    );
    info!("User {} logged in as {}", user.username, user.role);

    let cookie = state.sessions.build_cookie(&session);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "user": session_user })),
    ))
}

/// Re-hashes a verified password stored under weaker parameters. Failures
/// only log; the login itself has already succeeded.
async fn upgrade_password_hash(state: &AppState, user_id: i32, stored: &str, password: &str) {
    match state.passwords.needs_rehash(stored) {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            warn!("Cannot inspect password hash for user {user_id}: {e}");
            return;
        }
    }

    let hash = match state.passwords.spawn_hash(password).await {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Failed to re-hash password for user {user_id}: {e}");
            return;
        }
    };
    match state.store().update_user_password(user_id, &hash) {
        Ok(_) => info!("Upgraded password hash for user {user_id}"),
        Err(e) => warn!("Failed to store re-hashed password for user {user_id}: {e}"),
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(session_id) =
        session_id_from_headers(&headers, &state.sessions.config().cookie_name)
    {
        if let Ok(Some(session)) = state.sessions.validate_session(&session_id).await {
            activity::record(
                state.store(),
                Some(session.user_id()),
                "logout",
                serde_json::json!({}),
                &meta,
            );
        }
        state
            .sessions
            .revoke_session(&session_id)
            .await
            .map_err(|e| ApiError::unexpected("Failed to logout", e))?;
    }

    Ok((
        [(header::SET_COOKIE, state.sessions.build_logout_cookie())],
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    ))
}

pub async fn me(user: CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": user.user }))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
