use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::Role;
use crate::core::shared::state::AppState;
use crate::core::storage::{AuditFilter, PortalStore};
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::validation::ValidationError;

const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csps,
    Transactions,
    Audits,
    Alerts,
    Applications,
    Users,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csps => "csps",
            Self::Transactions => "transactions",
            Self::Audits => "audits",
            Self::Alerts => "alerts",
            Self::Applications => "applications",
            Self::Users => "users",
        }
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Self::Users => &[Role::Admin],
            _ => &[Role::Admin, Role::Bank],
        }
    }
}

impl FromStr for ExportKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csps" => Ok(Self::Csps),
            "transactions" => Ok(Self::Transactions),
            "audits" => Ok(Self::Audits),
            "alerts" => Ok(Self::Alerts),
            "applications" => Ok(Self::Applications),
            "users" => Ok(Self::Users),
            _ => Err(ApiError::bad_request("Invalid export type")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub columns: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExportOptions {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub columns: Option<Vec<String>>,
    pub format: ExportFormat,
    pub limit: usize,
}

fn parse_bound(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| ValidationError::InvalidFormat {
                    field: field.to_string(),
                    expected: "RFC 3339 timestamp".to_string(),
                })
        })
        .transpose()
}

impl ExportQuery {
    pub fn into_options(self, limit: usize) -> ApiResult<ExportOptions> {
        let mut errors = Vec::new();
        let from = parse_bound(self.from_date.as_deref(), "fromDate")
            .map_err(|e| errors.push(e))
            .ok()
            .flatten();
        let to = parse_bound(self.to_date.as_deref(), "toDate")
            .map_err(|e| errors.push(e))
            .ok()
            .flatten();
        let format = match self.format.as_deref() {
            None | Some("") | Some("json") => ExportFormat::Json,
            Some("csv") => ExportFormat::Csv,
            Some(_) => {
                errors.push(ValidationError::InvalidValue {
                    field: "format".to_string(),
                    message: "must be one of json, csv".to_string(),
                });
                ExportFormat::Json
            }
        };
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let columns = self
            .columns
            .map(|c| {
                c.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|c| !c.is_empty());

        Ok(ExportOptions {
            from,
            to,
            columns,
            format,
            limit,
        })
    }
}

fn to_rows<T: Serialize>(items: Vec<T>) -> ApiResult<Vec<Map<String, Value>>> {
    items
        .into_iter()
        .map(|item| match serde_json::to_value(item) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ApiError::unexpected(
                "Failed to export data",
                format!("expected an object row, got {other}"),
            )),
            Err(e) => Err(ApiError::unexpected("Failed to export data", e)),
        })
        .collect()
}

/// Loads every row of `kind` as camelCase JSON objects, newest first.
pub fn load_rows(store: &dyn PortalStore, kind: ExportKind) -> ApiResult<Vec<Map<String, Value>>> {
    let failed = ApiError::internal("Failed to export data");
    match kind {
        ExportKind::Csps => to_rows(store.list_csps().map_err(failed)?),
        ExportKind::Transactions => to_rows(store.list_transactions(None).map_err(failed)?),
        ExportKind::Audits => to_rows(store.list_audits(&AuditFilter::default()).map_err(failed)?),
        ExportKind::Alerts => to_rows(store.list_alerts(None).map_err(failed)?),
        ExportKind::Applications => to_rows(store.list_applications(None).map_err(failed)?),
        ExportKind::Users => to_rows(store.list_users(None).map_err(failed)?),
    }
}

fn created_at(row: &Map<String, Value>) -> Option<DateTime<Utc>> {
    row.get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Drops requested names no row carries. When none survive the export falls
/// back to every column instead of producing empty rows.
pub fn known_columns(rows: &[Map<String, Value>], requested: Option<Vec<String>>) -> Option<Vec<String>> {
    let known: Vec<String> = requested?
        .into_iter()
        .filter(|c| rows.iter().any(|r| r.contains_key(c)))
        .collect();
    if known.is_empty() {
        debug!("No requested export column matched, exporting all columns");
        None
    } else {
        Some(known)
    }
}

/// Applies the date window, the row cap and the column projection.
pub fn select_rows(rows: Vec<Map<String, Value>>, options: &ExportOptions) -> Vec<Map<String, Value>> {
    rows.into_iter()
        .filter(|row| {
            let ts = created_at(row);
            let after = options.from.map_or(true, |from| ts.is_some_and(|t| t >= from));
            let before = options.to.map_or(true, |to| ts.is_some_and(|t| t <= to));
            after && before
        })
        .take(options.limit)
        .map(|row| match &options.columns {
            Some(columns) => columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
            None => row,
        })
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Header order follows `columns` when given, otherwise the first row's keys.
pub fn render_csv(rows: &[Map<String, Value>], columns: Option<&[String]>) -> ApiResult<Vec<u8>> {
    let header: Vec<String> = match columns {
        Some(columns) => columns
            .iter()
            .filter(|c| rows.iter().any(|r| r.contains_key(*c)))
            .cloned()
            .collect(),
        None => rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default(),
    };

    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record(&header)
        .map_err(|e| ApiError::unexpected("Failed to export data", e))?;
    for row in rows {
        writer
            .write_record(header.iter().map(|h| cell(row.get(h))))
            .map_err(|e| ApiError::unexpected("Failed to export data", e))?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::unexpected("Failed to export data", e))
}

pub async fn export_data(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(kind): Path<String>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    user.require_role(&[Role::Admin, Role::Bank])?;
    let kind: ExportKind = kind.parse()?;
    user.require_role(kind.allowed_roles())?;

    let mut options = query.into_options(state.config.export_max_records)?;
    let store = state.store();
    let rows = load_rows(store, kind)?;
    options.columns = known_columns(&rows, options.columns.take());
    let rows = select_rows(rows, &options);

    activity::record(
        store,
        Some(user.id()),
        "export_data",
        serde_json::json!({ "type": kind.as_str(), "count": rows.len() }),
        &meta,
    );

    match options.format {
        ExportFormat::Json => Ok(Json(serde_json::json!({ "data": rows })).into_response()),
        ExportFormat::Csv => {
            let body = render_csv(&rows, options.columns.as_deref())?;
            let file_name = format!(
                "{}_export_{}.csv",
                kind.as_str(),
                Utc::now().format("%Y%m%d%H%M%S")
            );
            Ok((
                [
                    (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                ],
                body,
            )
                .into_response())
        }
    }
}

pub fn configure_export_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/export/:kind", get(export_data))
}
