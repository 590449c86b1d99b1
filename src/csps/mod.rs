use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult, FieldError};
use crate::core::shared::models::{Csp, CspChanges, CspStatus, NewCsp, Role};
use crate::core::shared::state::AppState;
use crate::notifications::notify;
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::{
    validate_choice, validate_digits, validate_present, validate_range, validate_required,
    ValidationError, Validator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    pub fn of(score: i32) -> Self {
        match score {
            s if s >= 80 => Self::High,
            s if s >= 50 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CspQuery {
    pub search: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub score: Option<String>,
}

/// Parsed list filters. Empty strings and `all` mean no filter.
#[derive(Debug, Default)]
pub struct CspFilter {
    pub search: Option<String>,
    pub state: Option<String>,
    pub status: Option<CspStatus>,
    pub score: Option<ScoreBand>,
}

fn meaningful(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "all")
}

impl CspQuery {
    pub fn into_filter(self) -> Result<CspFilter, Vec<ValidationError>> {
        let mut v = Validator::new();

        let status = meaningful(self.status).and_then(|s| {
            v.take(validate_choice::<CspStatus>(&s, "status", &CspStatus::tokens()))
        });
        let score = meaningful(self.score).and_then(|s| {
            let band = ScoreBand::parse(&s);
            if band.is_none() {
                v.check(Err(ValidationError::InvalidValue {
                    field: "score".into(),
                    message: "must be one of high, medium, low".into(),
                }));
            }
            band
        });

        v.finish()?;
        Ok(CspFilter {
            search: meaningful(self.search).map(|s| s.to_lowercase()),
            state: meaningful(self.state),
            status,
            score,
        })
    }
}

impl CspFilter {
    pub fn matches(&self, csp: &Csp) -> bool {
        if let Some(term) = &self.search {
            let hit = csp.address.to_lowercase().contains(term)
                || csp.city.to_lowercase().contains(term)
                || csp.aadhaar_number.contains(term.as_str());
            if !hit {
                return false;
            }
        }
        if let Some(state) = &self.state {
            if !csp.state.eq_ignore_ascii_case(state) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if csp.status != status {
                return false;
            }
        }
        if let Some(band) = self.score {
            if ScoreBand::of(csp.score) != band {
                return false;
            }
        }
        true
    }
}

pub async fn list_csps(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<CspQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = query.into_filter()?;
    let csps: Vec<Csp> = state
        .store()
        .list_csps()
        .map_err(ApiError::internal("Failed to retrieve CSPs"))?
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();

    Ok(Json(serde_json::json!({ "csps": csps })))
}

pub async fn get_csp(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    let csp = state
        .store()
        .get_csp(id)
        .map_err(ApiError::internal("Failed to retrieve CSP"))?
        .ok_or_else(|| ApiError::not_found("CSP not found"))?;

    Ok(Json(serde_json::json!({ "csp": csp })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCspRequest {
    pub user_id: Option<i32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub aadhaar_number: Option<String>,
    pub pan_number: Option<String>,
    pub education: Option<String>,
    #[serde(alias = "photoUrl")]
    pub photo: Option<String>,
    pub location: Option<serde_json::Value>,
    pub score: Option<i32>,
    pub status: Option<String>,
    pub working_capital: Option<f64>,
}

impl CreateCspRequest {
    pub fn validate(self) -> Result<NewCsp, Vec<ValidationError>> {
        let mut v = Validator::new();

        let user_id = v.take(validate_present(self.user_id, "userId"));
        let address = v.take(validate_required(self.address.as_deref(), "address"));
        let city = v.take(validate_required(self.city.as_deref(), "city"));
        let state = v.take(validate_required(self.state.as_deref(), "state"));
        let pincode = v.take(validate_required(self.pincode.as_deref(), "pincode"));
        if let Some(pincode) = pincode {
            v.check(validate_digits(pincode, "pincode", 6));
        }
        let aadhaar = v.take(validate_required(self.aadhaar_number.as_deref(), "aadhaarNumber"));
        if let Some(aadhaar) = aadhaar {
            v.check(validate_digits(aadhaar, "aadhaarNumber", 12));
        }
        if let Some(score) = self.score {
            v.check(validate_range(score, "score", Some(0), Some(100)));
        }
        if let Some(capital) = self.working_capital {
            v.check(validate_working_capital(capital));
        }
        let status = match self.status.as_deref() {
            Some(s) => v.take(validate_choice(s, "status", &CspStatus::tokens())),
            None => Some(CspStatus::Pending),
        };

        let owned = |value: Option<&str>| value.map(str::to_string).unwrap_or_default();
        let csp = NewCsp {
            user_id: user_id.unwrap_or_default(),
            address: owned(address),
            city: owned(city),
            state: owned(state),
            pincode: owned(pincode),
            aadhaar_number: owned(aadhaar),
            pan_number: self.pan_number.clone().filter(|p| !p.trim().is_empty()),
            education: self.education.clone().filter(|e| !e.trim().is_empty()),
            photo_url: self.photo.clone().filter(|p| !p.trim().is_empty()),
            location: self
                .location
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            score: self.score.unwrap_or(100),
            status: status.unwrap_or(CspStatus::Pending),
            working_capital: self.working_capital.unwrap_or(0.0),
        };

        v.finish().map(|()| csp)
    }
}

fn validate_working_capital(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: "workingCapital".into(),
            message: "must be zero or more".into(),
        })
    }
}

pub async fn create_csp(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Json(req): Json<CreateCspRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    user.require_role(&[Role::Admin])?;
    let new_csp = req.validate()?;

    let store = state.store();
    let owner = store
        .get_user(new_csp.user_id)
        .map_err(ApiError::internal("Failed to create CSP"))?;
    match owner {
        Some(owner) if owner.role == Role::Csp => {}
        _ => {
            return Err(ApiError::Validation(vec![FieldError::new(
                "userId",
                "must reference a user with role csp",
            )]))
        }
    }

    let csp = store.create_csp(new_csp).map_err(|e| {
        if e.is_conflict_on("user_id") {
            ApiError::conflict("CSP profile already exists for this user")
        } else {
            ApiError::internal("Failed to create CSP")(e)
        }
    })?;

    activity::record(
        store,
        Some(user.id()),
        "create_csp",
        serde_json::json!({ "cspId": csp.id }),
        &meta,
    );

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "csp": csp }))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCspRequest {
    pub status: Option<String>,
    pub score: Option<i32>,
    pub working_capital: Option<f64>,
}

impl UpdateCspRequest {
    pub fn validate(self) -> Result<CspChanges, Vec<ValidationError>> {
        let mut v = Validator::new();

        let status = self
            .status
            .as_deref()
            .and_then(|s| v.take(validate_choice::<CspStatus>(s, "status", &CspStatus::tokens())));
        if let Some(score) = self.score {
            v.check(validate_range(score, "score", Some(0), Some(100)));
        }
        if let Some(capital) = self.working_capital {
            v.check(validate_working_capital(capital));
        }

        let changes = CspChanges {
            status,
            score: self.score,
            working_capital: self.working_capital,
        };
        if v.is_valid() && changes.is_empty() {
            v.check(Err(ValidationError::Required("status".into())));
        }

        v.finish().map(|()| changes)
    }
}

pub async fn update_csp(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Json(req): Json<UpdateCspRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin, Role::Bank])?;
    let changes = req.validate()?;

    let store = state.store();
    let before = store
        .get_csp(id)
        .map_err(ApiError::internal("Failed to update CSP"))?
        .ok_or_else(|| ApiError::not_found("CSP not found"))?;

    let new_status = changes.status;
    let csp = store
        .update_csp(id, changes)
        .map_err(ApiError::internal("Failed to update CSP"))?
        .ok_or_else(|| ApiError::not_found("CSP not found"))?;

    activity::record(
        store,
        Some(user.id()),
        "update_csp",
        serde_json::json!({
            "cspId": csp.id,
            "status": csp.status,
            "score": csp.score,
            "workingCapital": csp.working_capital,
        }),
        &meta,
    );

    if let Some(status) = new_status.filter(|s| *s != before.status) {
        notify(
            store,
            csp.user_id,
            "CSP Status Updated",
            &format!("Your CSP status has been updated to {status}"),
        );
    }

    Ok(Json(serde_json::json!({ "csp": csp })))
}

pub fn configure_csp_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/csps", get(list_csps).post(create_csp))
        .route("/api/csps/:id", get(get_csp).patch(update_csp))
}
