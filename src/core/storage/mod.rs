//! Persistence seam for the portal.
//!
//! Handlers only ever see `dyn PortalStore`. [`PgStore`] is the production
//! implementation over diesel, [`MemoryStore`] keeps everything in process
//! for development without a database and for the test suite.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::core::shared::models::{
    ActivityLog, Alert, AlertChanges, Application, ApplicationReview, ApplicationStatus, Audit,
    AuditChanges, AuditStatus, Csp, CspChanges, NewActivityLog, NewAlert, NewApplication,
    NewAudit, NewCsp, NewNotification, NewTransaction, NewUser, Notification,
    NotificationStatus, Role, Transaction, User, UserStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    /// A unique constraint was violated. Carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// A foreign key points at a missing row. Carries the constraint name.
    #[error("foreign key violated: {0}")]
    InvalidReference(String),
}

impl StoreError {
    pub fn is_conflict_on(&self, column: &str) -> bool {
        matches!(self, Self::Conflict(constraint) if constraint.contains(column))
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(info.constraint_name().unwrap_or("unique").to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::InvalidReference(info.constraint_name().unwrap_or("foreign_key").to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Connection(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub csp_id: Option<i32>,
    pub auditor_id: Option<i32>,
    pub status: Option<AuditStatus>,
}

#[derive(Debug, Clone)]
pub struct ActivityFilter {
    pub user_id: Option<i32>,
    pub action: Option<String>,
    pub limit: usize,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            action: None,
            limit: 500,
        }
    }
}

/// All list operations return rows newest first (`created_at desc, id desc`).
/// Updates return `Ok(None)` when the row does not exist.
pub trait PortalStore: Send + Sync {
    fn ping(&self) -> StoreResult<()>;

    fn create_user(&self, user: NewUser) -> StoreResult<User>;
    fn get_user(&self, id: i32) -> StoreResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
    fn update_user_status(&self, id: i32, status: UserStatus) -> StoreResult<Option<User>>;
    fn update_user_password(&self, id: i32, password_hash: &str) -> StoreResult<Option<User>>;

    fn create_csp(&self, csp: NewCsp) -> StoreResult<Csp>;
    fn get_csp(&self, id: i32) -> StoreResult<Option<Csp>>;
    fn get_csp_by_user_id(&self, user_id: i32) -> StoreResult<Option<Csp>>;
    fn list_csps(&self) -> StoreResult<Vec<Csp>>;
    fn update_csp(&self, id: i32, changes: CspChanges) -> StoreResult<Option<Csp>>;

    fn create_transaction(&self, tx: NewTransaction) -> StoreResult<Transaction>;
    fn get_transaction(&self, id: i32) -> StoreResult<Option<Transaction>>;
    fn list_transactions(&self, csp_id: Option<i32>) -> StoreResult<Vec<Transaction>>;

    fn create_audit(&self, audit: NewAudit) -> StoreResult<Audit>;
    fn get_audit(&self, id: i32) -> StoreResult<Option<Audit>>;
    fn list_audits(&self, filter: &AuditFilter) -> StoreResult<Vec<Audit>>;
    fn update_audit(&self, id: i32, changes: AuditChanges) -> StoreResult<Option<Audit>>;

    fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert>;
    fn get_alert(&self, id: i32) -> StoreResult<Option<Alert>>;
    fn list_alerts(&self, csp_id: Option<i32>) -> StoreResult<Vec<Alert>>;
    fn update_alert_status(&self, id: i32, changes: AlertChanges) -> StoreResult<Option<Alert>>;

    fn create_application(&self, application: NewApplication) -> StoreResult<Application>;
    fn list_applications(&self, status: Option<ApplicationStatus>)
        -> StoreResult<Vec<Application>>;
    fn review_application(
        &self,
        id: i32,
        review: ApplicationReview,
    ) -> StoreResult<Option<Application>>;

    fn create_activity_log(&self, entry: NewActivityLog) -> StoreResult<ActivityLog>;
    fn list_activity_logs(&self, filter: &ActivityFilter) -> StoreResult<Vec<ActivityLog>>;

    fn create_notification(&self, notification: NewNotification) -> StoreResult<Notification>;
    fn get_notification(&self, id: i32) -> StoreResult<Option<Notification>>;
    fn list_notifications_for_user(
        &self,
        user_id: i32,
        status: Option<NotificationStatus>,
    ) -> StoreResult<Vec<Notification>>;
    fn mark_notification_read(&self, id: i32) -> StoreResult<Option<Notification>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_column_match() {
        let err = StoreError::Conflict("users_email_key".into());
        assert!(err.is_conflict_on("email"));
        assert!(!err.is_conflict_on("username"));
        assert!(!StoreError::Query("users_email_key".into()).is_conflict_on("email"));
    }

    #[test]
    fn test_foreign_key_violation_is_an_invalid_reference() {
        use diesel::result::{DatabaseErrorKind, Error};

        let err = StoreError::from(Error::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(String::from("insert on alerts violates foreign key")),
        ));
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[test]
    fn test_activity_filter_default_limit() {
        assert_eq!(ActivityFilter::default().limit, 500);
    }
}
