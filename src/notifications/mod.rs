use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{NewNotification, NotificationStatus};
use crate::core::shared::state::AppState;
use crate::core::storage::PortalStore;
use crate::security::auth::CurrentUser;
use crate::security::validation::validate_choice;

/// Sends a `system` notification to one user. Failures are logged, never
/// returned.
pub fn notify(store: &dyn PortalStore, user_id: i32, title: &str, message: &str) {
    if let Err(e) = store.create_notification(NewNotification::system(user_id, title, message)) {
        warn!("Failed to notify user {user_id} ({title}): {e}");
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub status: Option<String>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            validate_choice::<NotificationStatus>(s, "status", &NotificationStatus::tokens())
                .map_err(|e| ApiError::from(vec![e]))?,
        ),
        None => None,
    };

    let notifications = state
        .store()
        .list_notifications_for_user(user.id(), status)
        .map_err(ApiError::internal("Failed to retrieve notifications"))?;

    Ok(Json(serde_json::json!({ "notifications": notifications })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state.store();
    let existing = store
        .get_notification(id)
        .map_err(ApiError::internal("Failed to update notification"))?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if existing.user_id != Some(user.id()) {
        return Err(ApiError::forbidden(
            "Cannot mark other users' notifications as read",
        ));
    }

    let notification = store
        .mark_notification_read(id)
        .map_err(ApiError::internal("Failed to update notification"))?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(Json(serde_json::json!({ "notification": notification })))
}

pub fn configure_notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id", patch(mark_read))
}
