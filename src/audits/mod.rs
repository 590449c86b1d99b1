use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult, FieldError};
use crate::core::shared::models::{AuditChanges, AuditStatus, NewAudit, Role};
use crate::core::shared::state::AppState;
use crate::core::storage::AuditFilter;
use crate::notifications::notify;
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::{
    validate_choice, validate_present, validate_range, validate_required, ValidationError,
    Validator,
};

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_schedule_date(value: &str, field: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: field.to_string(),
            expected: "RFC 3339 timestamp or YYYY-MM-DD".to_string(),
        })
}

fn parse_status(value: Option<&str>) -> Result<Option<AuditStatus>, ValidationError> {
    value
        .map(|s| validate_choice::<AuditStatus>(s, "status", &AuditStatus::tokens()))
        .transpose()
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub status: Option<String>,
}

pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state.store();
    let mut filter = AuditFilter {
        status: parse_status(query.status.as_deref()).map_err(|e| ApiError::from(vec![e]))?,
        ..AuditFilter::default()
    };

    match user.role() {
        Role::Auditor => filter.auditor_id = Some(user.id()),
        Role::Csp => {
            match store
                .get_csp_by_user_id(user.id())
                .map_err(ApiError::internal("Failed to retrieve audits"))?
            {
                Some(csp) => filter.csp_id = Some(csp.id),
                None => return Ok(Json(serde_json::json!({ "audits": [] }))),
            }
        }
        _ => {}
    }

    let audits = store
        .list_audits(&filter)
        .map_err(ApiError::internal("Failed to retrieve audits"))?;

    Ok(Json(serde_json::json!({ "audits": audits })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditRequest {
    pub csp_id: Option<i32>,
    pub auditor_id: Option<i32>,
    pub scheduled_date: Option<String>,
    pub notes: Option<String>,
}

impl CreateAuditRequest {
    pub fn validate(self) -> Result<NewAudit, Vec<ValidationError>> {
        let mut v = Validator::new();

        let csp_id = v.take(validate_present(self.csp_id, "cspId"));
        let auditor_id = v.take(validate_present(self.auditor_id, "auditorId"));
        let scheduled_date = v
            .take(validate_required(self.scheduled_date.as_deref(), "scheduledDate"))
            .and_then(|d| v.take(parse_schedule_date(d, "scheduledDate")));

        let audit = NewAudit {
            csp_id: csp_id.unwrap_or_default(),
            auditor_id: auditor_id.unwrap_or_default(),
            scheduled_date: scheduled_date.unwrap_or_else(Utc::now),
            status: AuditStatus::Scheduled,
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
        };

        v.finish().map(|()| audit)
    }
}

pub async fn create_audit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Json(req): Json<CreateAuditRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    user.require_role(&[Role::Admin, Role::Bank])?;
    let new_audit = req.validate()?;

    let store = state.store();
    let mut errors = Vec::new();
    if store
        .get_csp(new_audit.csp_id)
        .map_err(ApiError::internal("Failed to create audit"))?
        .is_none()
    {
        errors.push(FieldError::new("cspId", "CSP not found"));
    }
    let auditor = store
        .get_user(new_audit.auditor_id)
        .map_err(ApiError::internal("Failed to create audit"))?;
    if !matches!(&auditor, Some(a) if a.role == Role::Auditor) {
        errors.push(FieldError::new(
            "auditorId",
            "must reference a user with role auditor",
        ));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let audit = store
        .create_audit(new_audit)
        .map_err(ApiError::internal("Failed to create audit"))?;

    activity::record(
        store,
        Some(user.id()),
        "create_audit",
        serde_json::json!({ "auditId": audit.id, "cspId": audit.csp_id }),
        &meta,
    );

    notify(
        store,
        audit.auditor_id,
        "New Audit Assignment",
        &format!(
            "You have been assigned a new audit scheduled for {}",
            audit.scheduled_date.format("%Y-%m-%d")
        ),
    );

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "audit": audit }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAuditRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub photos: Option<serde_json::Value>,
    pub videos: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub rating: Option<i32>,
    pub issues: Option<serde_json::Value>,
}

impl UpdateAuditRequest {
    /// Any status may follow any other. Moving to `completed` stamps
    /// `completedDate`.
    pub fn into_changes(self) -> Result<AuditChanges, Vec<ValidationError>> {
        let mut v = Validator::new();

        let status = v.take(parse_status(self.status.as_deref())).flatten();
        if let Some(rating) = self.rating {
            v.check(validate_range(rating, "rating", Some(1), Some(5)));
        }
        v.finish()?;

        Ok(AuditChanges {
            completed_date: (status == Some(AuditStatus::Completed)).then(Utc::now),
            status,
            notes: self.notes,
            photos: self.photos,
            videos: self.videos,
            location: self.location,
            rating: self.rating,
            issues: self.issues,
        })
    }
}

pub async fn update_audit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Json(req): Json<UpdateAuditRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Auditor, Role::Admin, Role::Bank])?;

    let store = state.store();
    let existing = store
        .get_audit(id)
        .map_err(ApiError::internal("Failed to update audit"))?
        .ok_or_else(|| ApiError::not_found("Audit not found"))?;

    if user.role() == Role::Auditor && existing.auditor_id != user.id() {
        return Err(ApiError::forbidden(
            "Cannot update audits assigned to other auditors",
        ));
    }

    let changes = req.into_changes()?;
    let completed = changes.status == Some(AuditStatus::Completed);

    let audit = store
        .update_audit(id, changes)
        .map_err(ApiError::internal("Failed to update audit"))?
        .ok_or_else(|| ApiError::not_found("Audit not found"))?;

    activity::record(
        store,
        Some(user.id()),
        "update_audit",
        serde_json::json!({ "auditId": audit.id, "status": audit.status }),
        &meta,
    );

    if completed {
        match store.list_users(Some(Role::Admin)) {
            Ok(admins) => {
                let message = format!(
                    "Audit #{} has been completed by {}",
                    audit.id, user.user.full_name
                );
                for admin in admins {
                    notify(store, admin.id, "Audit Completed", &message);
                }
            }
            Err(e) => warn!("Could not load admins to notify for audit {}: {e}", audit.id),
        }
    }

    Ok(Json(serde_json::json!({ "audit": audit })))
}

pub fn configure_audit_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/audits", get(list_audits).post(create_audit))
        .route("/api/audits/:id", patch(update_audit))
}
