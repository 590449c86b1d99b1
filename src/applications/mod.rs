use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{
    ApplicationReview, ApplicationStatus, NewApplication, Role,
};
use crate::core::shared::state::AppState;
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::{
    validate_choice, validate_digits, validate_email, validate_phone, validate_required,
    ValidationError, Validator,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub aadhaar_number: Option<String>,
    pub address: Option<String>,
    pub education: Option<String>,
    pub photo_url: Option<String>,
}

impl CreateApplicationRequest {
    /// Status is always `pending` for a new application, whatever the client sent.
    pub fn validate(self) -> Result<NewApplication, Vec<ValidationError>> {
        let mut v = Validator::new();

        let first_name = v.take(validate_required(self.first_name.as_deref(), "firstName"));
        let last_name = v.take(validate_required(self.last_name.as_deref(), "lastName"));
        let email = v.take(validate_required(self.email.as_deref(), "email"));
        if let Some(email) = email {
            v.check(validate_email(email, "email"));
        }
        let phone = v.take(validate_required(self.phone.as_deref(), "phone"));
        if let Some(phone) = phone {
            v.check(validate_phone(phone, "phone"));
        }
        let aadhaar = v.take(validate_required(self.aadhaar_number.as_deref(), "aadhaarNumber"));
        if let Some(aadhaar) = aadhaar {
            v.check(validate_digits(aadhaar, "aadhaarNumber", 12));
        }
        let address = v.take(validate_required(self.address.as_deref(), "address"));
        let education = v.take(validate_required(self.education.as_deref(), "education"));

        let owned = |value: Option<&str>| value.map(str::to_string).unwrap_or_default();
        let application = NewApplication {
            first_name: owned(first_name),
            last_name: owned(last_name),
            email: owned(email),
            phone: owned(phone),
            aadhaar_number: owned(aadhaar),
            address: owned(address),
            education: owned(education),
            photo_url: self.photo_url.clone().filter(|p| !p.trim().is_empty()),
            status: ApplicationStatus::Pending,
        };

        v.finish().map(|()| application)
    }
}

pub async fn create_application(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Json(req): Json<CreateApplicationRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let new_application = req.validate()?;

    let store = state.store();
    let application = store
        .create_application(new_application)
        .map_err(ApiError::internal("Failed to submit application"))?;

    activity::record(
        store,
        None,
        "create_application",
        serde_json::json!({ "applicationId": application.id }),
        &meta,
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "application": application })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<String>,
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin, Role::Bank])?;

    let status = match query.status.as_deref() {
        Some(s) => Some(
            validate_choice::<ApplicationStatus>(s, "status", &ApplicationStatus::tokens())
                .map_err(|e| ApiError::from(vec![e]))?,
        ),
        None => None,
    };

    let applications = state
        .store()
        .list_applications(status)
        .map_err(ApiError::internal("Failed to retrieve applications"))?;

    Ok(Json(serde_json::json!({ "applications": applications })))
}

#[derive(Debug, Deserialize)]
pub struct ReviewApplicationRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn review_application(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Json(req): Json<ReviewApplicationRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin, Role::Bank])?;

    let status = req
        .status
        .as_deref()
        .and_then(|s| s.parse::<ApplicationStatus>().ok())
        .filter(|s| ApplicationStatus::REVIEWABLE.contains(s))
        .ok_or_else(|| ApiError::bad_request("Valid status (approved/rejected) is required"))?;

    let store = state.store();
    let review = ApplicationReview {
        status,
        notes: req.notes.unwrap_or_default(),
        reviewed_by: user.id(),
        reviewed_at: Utc::now(),
    };
    let application = store
        .review_application(id, review)
        .map_err(ApiError::internal("Failed to update application"))?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    activity::record(
        store,
        Some(user.id()),
        &format!("{status}_application"),
        serde_json::json!({ "applicationId": application.id }),
        &meta,
    );

    Ok(Json(serde_json::json!({ "application": application })))
}

pub fn configure_application_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/applications",
            get(list_applications).post(create_application),
        )
        .route("/api/applications/:id", patch(review_application))
}
