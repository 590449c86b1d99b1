use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

pub use super::enums::{
    AlertSeverity, AlertStatus, AlertType, ApplicationStatus, AuditStatus, CspStatus,
    NotificationStatus, NotificationType, Role, TransactionStatus, TransactionType, UserStatus,
};
pub use super::schema::{
    activity_logs, alerts, applications, audits, csps, notifications, transactions, users,
};

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = csps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Csp {
    pub id: i32,
    pub user_id: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub aadhaar_number: String,
    pub pan_number: Option<String>,
    pub education: Option<String>,
    #[serde(rename = "photo")]
    pub photo_url: Option<String>,
    pub location: serde_json::Value,
    pub score: i32,
    pub status: CspStatus,
    pub working_capital: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = csps)]
pub struct NewCsp {
    pub user_id: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub aadhaar_number: String,
    pub pan_number: Option<String>,
    pub education: Option<String>,
    pub photo_url: Option<String>,
    pub location: serde_json::Value,
    pub score: i32,
    pub status: CspStatus,
    pub working_capital: f64,
}

/// Fields an admin or bank officer may change on a CSP profile.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = csps)]
pub struct CspChanges {
    pub status: Option<CspStatus>,
    pub score: Option<i32>,
    pub working_capital: Option<f64>,
}

impl CspChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.score.is_none() && self.working_capital.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i32,
    pub csp_id: i32,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub location: Option<serde_json::Value>,
    pub risk_score: i32,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub csp_id: i32,
    pub kind: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub location: Option<serde_json::Value>,
    pub risk_score: i32,
    pub flagged: bool,
    pub flag_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = audits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub id: i32,
    pub csp_id: i32,
    pub auditor_id: i32,
    pub scheduled_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub status: AuditStatus,
    pub notes: Option<String>,
    pub photos: Option<serde_json::Value>,
    pub videos: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub rating: Option<i32>,
    pub issues: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audits)]
pub struct NewAudit {
    pub csp_id: i32,
    pub auditor_id: i32,
    pub scheduled_date: DateTime<Utc>,
    pub status: AuditStatus,
    pub notes: Option<String>,
}

/// Partial audit update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = audits)]
pub struct AuditChanges {
    pub status: Option<AuditStatus>,
    pub completed_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub photos: Option<serde_json::Value>,
    pub videos: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub rating: Option<i32>,
    pub issues: Option<serde_json::Value>,
}

impl AuditChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.completed_date.is_none()
            && self.notes.is_none()
            && self.photos.is_none()
            && self.videos.is_none()
            && self.location.is_none()
            && self.rating.is_none()
            && self.issues.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = alerts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i32,
    pub csp_id: Option<i32>,
    pub transaction_id: Option<i32>,
    #[serde(rename = "type")]
    pub kind: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub status: AlertStatus,
    pub assigned_to: Option<i32>,
    pub resolved_by: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = alerts)]
pub struct NewAlert {
    pub csp_id: Option<i32>,
    pub transaction_id: Option<i32>,
    pub kind: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub status: AlertStatus,
    pub assigned_to: Option<i32>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = alerts)]
pub struct AlertChanges {
    pub status: AlertStatus,
    pub assigned_to: Option<i32>,
    pub resolved_by: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = applications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub aadhaar_number: String,
    pub address: String,
    pub education: String,
    pub photo_url: Option<String>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub aadhaar_number: String,
    pub address: String,
    pub education: String,
    pub photo_url: Option<String>,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = applications)]
pub struct ApplicationReview {
    pub status: ApplicationStatus,
    pub notes: String,
    pub reviewed_by: i32,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = activity_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: i32,
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activity_logs)]
pub struct NewActivityLog {
    pub user_id: Option<i32>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub user_id: Option<i32>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub status: NotificationStatus,
}

impl NewNotification {
    pub fn system(user_id: i32, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            title: title.into(),
            message: message.into(),
            kind: NotificationType::System,
            status: NotificationStatus::Unread,
        }
    }
}
