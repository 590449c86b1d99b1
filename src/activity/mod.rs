use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{NewActivityLog, Role};
use crate::core::shared::state::AppState;
use crate::core::storage::{ActivityFilter, PortalStore};
use crate::security::auth::{CurrentUser, RequestMeta};

pub const DEFAULT_LIMIT: usize = 500;
pub const MAX_LIMIT: usize = 10_000;

/// Appends an activity log entry. A failed write is logged and swallowed so
/// it never fails the request that triggered it.
pub fn record(
    store: &dyn PortalStore,
    user_id: Option<i32>,
    action: &str,
    details: serde_json::Value,
    meta: &RequestMeta,
) {
    let entry = NewActivityLog {
        user_id,
        action: action.to_string(),
        details: Some(details),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
    };
    if let Err(e) = store.create_activity_log(entry) {
        warn!("Failed to record activity '{action}': {e}");
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub user_id: Option<i32>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

impl ActivityQuery {
    pub fn into_filter(self) -> ActivityFilter {
        ActivityFilter {
            user_id: self.user_id,
            action: self.action.filter(|a| !a.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

pub async fn list_activity_logs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin, Role::Bank])?;

    let logs = state
        .store()
        .list_activity_logs(&query.into_filter())
        .map_err(ApiError::internal("Failed to retrieve activity logs"))?;

    Ok(Json(serde_json::json!({ "activityLogs": logs })))
}

pub fn configure_activity_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/activity-logs", get(list_activity_logs))
}
