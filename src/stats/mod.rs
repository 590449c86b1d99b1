use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{
    Alert, AlertSeverity, Audit, AuditStatus, Csp, CspStatus, Role, Transaction,
};
use crate::core::shared::state::AppState;
use crate::core::storage::AuditFilter;
use crate::security::auth::CurrentUser;

const VIEWERS: &[Role] = &[Role::Admin, Role::Bank];

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct CspStats {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub inactive: usize,
    pub suspended: usize,
}

impl CspStats {
    pub fn collect(csps: &[Csp]) -> Self {
        let count = |status: CspStatus| csps.iter().filter(|c| c.status == status).count();
        Self {
            total: csps.len(),
            active: count(CspStatus::Active),
            pending: count(CspStatus::Pending),
            inactive: count(CspStatus::Inactive),
            suspended: count(CspStatus::Suspended),
        }
    }
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total: usize,
    pub total_amount: f64,
    pub flagged: usize,
    pub by_type: BTreeMap<&'static str, usize>,
}

impl TransactionStats {
    pub fn collect(transactions: &[Transaction]) -> Self {
        let mut by_type = BTreeMap::new();
        for tx in transactions {
            *by_type.entry(tx.kind.as_str()).or_insert(0) += 1;
        }
        Self {
            total: transactions.len(),
            total_amount: transactions.iter().map(|t| t.amount).sum(),
            flagged: transactions.iter().filter(|t| t.flagged).count(),
            by_type,
        }
    }
}

/// Severity buckets count open alerts only.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct AlertStats {
    pub total: usize,
    pub open: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl AlertStats {
    pub fn collect(alerts: &[Alert]) -> Self {
        let mut stats = Self {
            total: alerts.len(),
            ..Self::default()
        };
        for alert in alerts.iter().filter(|a| !a.status.closes_alert()) {
            stats.open += 1;
            match alert.severity {
                AlertSeverity::Low => stats.low += 1,
                AlertSeverity::Medium => stats.medium += 1,
                AlertSeverity::High => stats.high += 1,
                AlertSeverity::Critical => stats.critical += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl AuditStats {
    pub fn collect(audits: &[Audit]) -> Self {
        let count = |status: AuditStatus| audits.iter().filter(|a| a.status == status).count();
        Self {
            total: audits.len(),
            scheduled: count(AuditStatus::Scheduled),
            in_progress: count(AuditStatus::InProgress),
            completed: count(AuditStatus::Completed),
            failed: count(AuditStatus::Failed),
        }
    }
}

pub async fn csp_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<CspStats>> {
    user.require_role(VIEWERS)?;
    let csps = state
        .store()
        .list_csps()
        .map_err(ApiError::internal("Failed to compute CSP stats"))?;
    Ok(Json(CspStats::collect(&csps)))
}

pub async fn transaction_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<TransactionStats>> {
    user.require_role(VIEWERS)?;
    let transactions = state
        .store()
        .list_transactions(None)
        .map_err(ApiError::internal("Failed to compute transaction stats"))?;
    Ok(Json(TransactionStats::collect(&transactions)))
}

pub async fn alert_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<AlertStats>> {
    user.require_role(VIEWERS)?;
    let alerts = state
        .store()
        .list_alerts(None)
        .map_err(ApiError::internal("Failed to compute alert stats"))?;
    Ok(Json(AlertStats::collect(&alerts)))
}

pub async fn audit_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<AuditStats>> {
    user.require_role(VIEWERS)?;
    let audits = state
        .store()
        .list_audits(&AuditFilter::default())
        .map_err(ApiError::internal("Failed to compute audit stats"))?;
    Ok(Json(AuditStats::collect(&audits)))
}

pub fn configure_stats_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats/csps", get(csp_stats))
        .route("/api/stats/transactions", get(transaction_stats))
        .route("/api/stats/alerts", get(alert_stats))
        .route("/api/stats/audits", get(audit_stats))
}
