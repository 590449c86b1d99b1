use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult, FieldError};
use crate::core::shared::models::{
    Alert, AlertChanges, AlertSeverity, AlertStatus, AlertType, NewAlert, Role,
};
use crate::core::shared::state::AppState;
use crate::notifications::notify;
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::{
    validate_choice, validate_optional_choice, validate_required, ValidationError, Validator,
};

const REVIEWERS: &[Role] = &[Role::Admin, Role::Bank, Role::Fi];

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state.store();

    let scope = if user.role() == Role::Csp {
        match store
            .get_csp_by_user_id(user.id())
            .map_err(ApiError::internal("Failed to retrieve alerts"))?
        {
            Some(csp) => Some(csp.id),
            None => return Ok(Json(serde_json::json!({ "alerts": [] }))),
        }
    } else {
        None
    };

    let alerts = store
        .list_alerts(scope)
        .map_err(ApiError::internal("Failed to retrieve alerts"))?;

    Ok(Json(serde_json::json!({ "alerts": alerts })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub csp_id: Option<i32>,
    pub transaction_id: Option<i32>,
    pub assigned_to: Option<i32>,
}

impl CreateAlertRequest {
    pub fn validate(self) -> Result<NewAlert, Vec<ValidationError>> {
        let mut v = Validator::new();

        let kind = v
            .take(validate_required(self.kind.as_deref(), "type"))
            .and_then(|k| v.take(validate_choice::<AlertType>(k, "type", &AlertType::tokens())));
        let severity = v.take(validate_optional_choice(
            self.severity.as_deref(),
            "severity",
            &AlertSeverity::tokens(),
            AlertSeverity::Medium,
        ));
        let message = v.take(validate_required(self.message.as_deref(), "message"));

        let alert = NewAlert {
            csp_id: self.csp_id,
            transaction_id: self.transaction_id,
            kind: kind.unwrap_or(AlertType::System),
            severity: severity.unwrap_or(AlertSeverity::Medium),
            message: message.map(str::to_string).unwrap_or_default(),
            status: AlertStatus::New,
            assigned_to: self.assigned_to,
        };

        v.finish().map(|()| alert)
    }
}

pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Json(req): Json<CreateAlertRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    user.require_role(REVIEWERS)?;
    let new_alert = req.validate()?;

    let store = state.store();
    let failed = || ApiError::internal("Failed to create alert");
    let mut errors = Vec::new();

    let csp = match new_alert.csp_id {
        Some(csp_id) => {
            let csp = store.get_csp(csp_id).map_err(failed())?;
            if csp.is_none() {
                errors.push(FieldError::new("cspId", "CSP not found"));
            }
            csp
        }
        None => None,
    };
    if let Some(tx_id) = new_alert.transaction_id {
        if store.get_transaction(tx_id).map_err(failed())?.is_none() {
            errors.push(FieldError::new("transactionId", "Transaction not found"));
        }
    }
    if let Some(assignee) = new_alert.assigned_to {
        if store.get_user(assignee).map_err(failed())?.is_none() {
            errors.push(FieldError::new("assignedTo", "User not found"));
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let alert = store.create_alert(new_alert).map_err(failed())?;

    activity::record(
        store,
        Some(user.id()),
        "create_alert",
        serde_json::json!({ "alertId": alert.id, "type": alert.kind, "severity": alert.severity }),
        &meta,
    );

    if let Some(csp) = csp {
        notify(
            store,
            csp.user_id,
            &format!("New {} Alert", alert.severity.as_str().to_uppercase()),
            &alert.message,
        );
    }

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "alert": alert }))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertRequest {
    pub status: Option<String>,
}

/// `acknowledged` claims an unassigned alert for the reviewer;
/// `resolved` and `false_positive` close it.
pub fn review_changes(alert: &Alert, status: AlertStatus, reviewer_id: i32) -> AlertChanges {
    let mut changes = AlertChanges {
        status,
        assigned_to: None,
        resolved_by: None,
        resolved_at: None,
    };
    if status == AlertStatus::Acknowledged && alert.assigned_to.is_none() {
        changes.assigned_to = Some(reviewer_id);
    }
    if status.closes_alert() {
        changes.resolved_by = Some(reviewer_id);
        changes.resolved_at = Some(Utc::now());
    }
    changes
}

pub async fn update_alert(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Json(req): Json<UpdateAlertRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(REVIEWERS)?;

    let status = req
        .status
        .as_deref()
        .and_then(|s| s.parse::<AlertStatus>().ok())
        .filter(|s| AlertStatus::REVIEWABLE.contains(s))
        .ok_or_else(|| ApiError::bad_request("Valid status is required"))?;

    let store = state.store();
    let existing = store
        .get_alert(id)
        .map_err(ApiError::internal("Failed to update alert"))?
        .ok_or_else(|| ApiError::not_found("Alert not found"))?;

    let alert = store
        .update_alert_status(id, review_changes(&existing, status, user.id()))
        .map_err(ApiError::internal("Failed to update alert"))?
        .ok_or_else(|| ApiError::not_found("Alert not found"))?;

    activity::record(
        store,
        Some(user.id()),
        "update_alert",
        serde_json::json!({ "alertId": alert.id, "status": alert.status }),
        &meta,
    );

    Ok(Json(serde_json::json!({ "alert": alert })))
}

pub fn configure_alert_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/:id", patch(update_alert))
}
