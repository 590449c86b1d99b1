use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult, FieldError};
use crate::core::shared::models::{NewTransaction, Role, TransactionStatus, TransactionType};
use crate::core::shared::state::AppState;
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::{
    validate_choice, validate_optional_choice, validate_positive, validate_present,
    validate_range, validate_required, ValidationError, Validator,
};

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state.store();

    let scope = if user.role() == Role::Csp {
        match store
            .get_csp_by_user_id(user.id())
            .map_err(ApiError::internal("Failed to retrieve transactions"))?
        {
            Some(csp) => Some(csp.id),
            None => return Ok(Json(serde_json::json!({ "transactions": [] }))),
        }
    } else {
        None
    };

    let transactions = store
        .list_transactions(scope)
        .map_err(ApiError::internal("Failed to retrieve transactions"))?;

    Ok(Json(serde_json::json!({ "transactions": transactions })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub csp_id: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub location: Option<serde_json::Value>,
    pub risk_score: Option<i32>,
    pub flagged: Option<bool>,
    pub flag_reason: Option<String>,
}

impl CreateTransactionRequest {
    pub fn validate(self) -> Result<NewTransaction, Vec<ValidationError>> {
        let mut v = Validator::new();

        let csp_id = v.take(validate_present(self.csp_id, "cspId"));
        let kind = v
            .take(validate_required(self.kind.as_deref(), "type"))
            .and_then(|k| {
                v.take(validate_choice::<TransactionType>(
                    k,
                    "type",
                    &TransactionType::tokens(),
                ))
            });
        let amount = v.take(validate_present(self.amount, "amount"));
        if let Some(amount) = amount {
            v.check(validate_positive(amount, "amount"));
        }
        let status = v.take(validate_optional_choice(
            self.status.as_deref(),
            "status",
            &TransactionStatus::tokens(),
            TransactionStatus::Completed,
        ));
        if let Some(risk) = self.risk_score {
            v.check(validate_range(risk, "riskScore", Some(0), Some(100)));
        }

        let tx = NewTransaction {
            csp_id: csp_id.unwrap_or_default(),
            kind: kind.unwrap_or(TransactionType::Deposit),
            amount: amount.unwrap_or_default(),
            status: status.unwrap_or(TransactionStatus::Completed),
            customer_phone: self.customer_phone.clone(),
            customer_name: self.customer_name.clone(),
            location: self.location.clone(),
            risk_score: self.risk_score.unwrap_or(0),
            flagged: self.flagged.unwrap_or(false),
            flag_reason: self.flag_reason.clone(),
        };

        v.finish().map(|()| tx)
    }
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Json(req): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let new_tx = req.validate()?;
    let store = state.store();

    if user.role() == Role::Csp {
        let own = store
            .get_csp_by_user_id(user.id())
            .map_err(ApiError::internal("Failed to create transaction"))?
            .ok_or_else(|| ApiError::forbidden("No CSP profile found for this user"))?;
        if own.id != new_tx.csp_id {
            return Err(ApiError::forbidden(
                "Cannot create transactions for other CSPs",
            ));
        }
    } else if store
        .get_csp(new_tx.csp_id)
        .map_err(ApiError::internal("Failed to create transaction"))?
        .is_none()
    {
        return Err(ApiError::Validation(vec![FieldError::new(
            "cspId",
            "CSP not found",
        )]));
    }

    let transaction = store
        .create_transaction(new_tx)
        .map_err(ApiError::internal("Failed to create transaction"))?;

    activity::record(
        store,
        Some(user.id()),
        "create_transaction",
        serde_json::json!({
            "transactionId": transaction.id,
            "amount": transaction.amount,
            "type": transaction.kind,
        }),
        &meta,
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "transaction": transaction })),
    ))
}

pub fn configure_transaction_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/transactions",
        get(list_transactions).post(create_transaction),
    )
}
