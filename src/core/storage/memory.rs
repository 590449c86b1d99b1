use chrono::{DateTime, Utc};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ActivityFilter, AuditFilter, PortalStore, StoreError, StoreResult};
use crate::core::shared::models::{
    ActivityLog, Alert, AlertChanges, Application, ApplicationReview, ApplicationStatus, Audit,
    AuditChanges, Csp, CspChanges, NewActivityLog, NewAlert, NewApplication, NewAudit, NewCsp,
    NewNotification, NewTransaction, NewUser, Notification, NotificationStatus, Role,
    Transaction, User, UserStatus,
};

trait Row: Clone {
    fn id(&self) -> i32;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! impl_row {
    ($($ty:ty),+) => {
        $(impl Row for $ty {
            fn id(&self) -> i32 {
                self.id
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        })+
    };
}

impl_row!(User, Csp, Transaction, Audit, Alert, Application, ActivityLog, Notification);

struct Table<T> {
    rows: Vec<T>,
    next_id: i32,
}

impl<T: Row> Table<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, build: impl FnOnce(i32) -> T) -> T {
        let row = build(self.next_id);
        self.next_id += 1;
        self.rows.push(row.clone());
        row
    }

    fn find(&self, id: i32) -> Option<T> {
        self.rows.iter().find(|r| r.id() == id).cloned()
    }

    fn contains(&self, id: i32) -> bool {
        self.rows.iter().any(|r| r.id() == id)
    }

    fn find_mut(&mut self, id: i32) -> Option<&mut T> {
        self.rows.iter_mut().find(|r| r.id() == id)
    }

    fn newest_first(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        let mut out: Vec<T> = self.rows.iter().filter(|r| keep(*r)).cloned().collect();
        out.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        out
    }
}

struct Tables {
    users: Table<User>,
    csps: Table<Csp>,
    transactions: Table<Transaction>,
    audits: Table<Audit>,
    alerts: Table<Alert>,
    applications: Table<Application>,
    activity_logs: Table<ActivityLog>,
    notifications: Table<Notification>,
}

/// In-process store with the same constraint behaviour as the SQL schema.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: Table::new(),
                csps: Table::new(),
                transactions: Table::new(),
                audits: Table::new(),
                alerts: Table::new(),
                applications: Table::new(),
                activity_logs: Table::new(),
                notifications: Table::new(),
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".into()))
    }
}

impl PortalStore for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.write()?;
        if t.users.rows.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("users_username_key".into()));
        }
        if t.users.rows.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        Ok(t.users.insert(|id| User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            status: user.status,
            created_at: Utc::now(),
        }))
    }

    fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.find(id))
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.read()?;
        Ok(t.users.rows.iter().find(|u| u.username == username).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.read()?;
        Ok(t.users.rows.iter().find(|u| u.email == email).cloned())
    }

    fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let t = self.read()?;
        Ok(t.users.newest_first(|u| role.map_or(true, |r| u.role == r)))
    }

    fn update_user_status(&self, id: i32, status: UserStatus) -> StoreResult<Option<User>> {
        let mut t = self.write()?;
        Ok(t.users.find_mut(id).map(|u| {
            u.status = status;
            u.clone()
        }))
    }

    fn update_user_password(&self, id: i32, password_hash: &str) -> StoreResult<Option<User>> {
        let mut t = self.write()?;
        Ok(t.users.find_mut(id).map(|u| {
            u.password_hash = password_hash.to_string();
            u.clone()
        }))
    }

    fn create_csp(&self, csp: NewCsp) -> StoreResult<Csp> {
        let mut t = self.write()?;
        if t.csps.rows.iter().any(|c| c.user_id == csp.user_id) {
            return Err(StoreError::Conflict("csps_user_id_key".into()));
        }
        Ok(t.csps.insert(|id| Csp {
            id,
            user_id: csp.user_id,
            address: csp.address,
            city: csp.city,
            state: csp.state,
            pincode: csp.pincode,
            aadhaar_number: csp.aadhaar_number,
            pan_number: csp.pan_number,
            education: csp.education,
            photo_url: csp.photo_url,
            location: csp.location,
            score: csp.score,
            status: csp.status,
            working_capital: csp.working_capital,
            created_at: Utc::now(),
        }))
    }

    fn get_csp(&self, id: i32) -> StoreResult<Option<Csp>> {
        Ok(self.read()?.csps.find(id))
    }

    fn get_csp_by_user_id(&self, user_id: i32) -> StoreResult<Option<Csp>> {
        let t = self.read()?;
        Ok(t.csps.rows.iter().find(|c| c.user_id == user_id).cloned())
    }

    fn list_csps(&self) -> StoreResult<Vec<Csp>> {
        Ok(self.read()?.csps.newest_first(|_| true))
    }

    fn update_csp(&self, id: i32, changes: CspChanges) -> StoreResult<Option<Csp>> {
        let mut t = self.write()?;
        Ok(t.csps.find_mut(id).map(|c| {
            if let Some(status) = changes.status {
                c.status = status;
            }
            if let Some(score) = changes.score {
                c.score = score;
            }
            if let Some(capital) = changes.working_capital {
                c.working_capital = capital;
            }
            c.clone()
        }))
    }

    fn create_transaction(&self, tx: NewTransaction) -> StoreResult<Transaction> {
        let mut t = self.write()?;
        Ok(t.transactions.insert(|id| Transaction {
            id,
            csp_id: tx.csp_id,
            kind: tx.kind,
            amount: tx.amount,
            status: tx.status,
            customer_phone: tx.customer_phone,
            customer_name: tx.customer_name,
            location: tx.location,
            risk_score: tx.risk_score,
            flagged: tx.flagged,
            flag_reason: tx.flag_reason,
            created_at: Utc::now(),
        }))
    }

    fn get_transaction(&self, id: i32) -> StoreResult<Option<Transaction>> {
        Ok(self.read()?.transactions.find(id))
    }

    fn list_transactions(&self, csp_id: Option<i32>) -> StoreResult<Vec<Transaction>> {
        let t = self.read()?;
        Ok(t
            .transactions
            .newest_first(|tx| csp_id.map_or(true, |id| tx.csp_id == id)))
    }

    fn create_audit(&self, audit: NewAudit) -> StoreResult<Audit> {
        let mut t = self.write()?;
        Ok(t.audits.insert(|id| Audit {
            id,
            csp_id: audit.csp_id,
            auditor_id: audit.auditor_id,
            scheduled_date: audit.scheduled_date,
            completed_date: None,
            status: audit.status,
            notes: audit.notes,
            photos: None,
            videos: None,
            location: None,
            rating: None,
            issues: None,
            created_at: Utc::now(),
        }))
    }

    fn get_audit(&self, id: i32) -> StoreResult<Option<Audit>> {
        Ok(self.read()?.audits.find(id))
    }

    fn list_audits(&self, filter: &AuditFilter) -> StoreResult<Vec<Audit>> {
        let t = self.read()?;
        Ok(t.audits.newest_first(|a| {
            filter.csp_id.map_or(true, |id| a.csp_id == id)
                && filter.auditor_id.map_or(true, |id| a.auditor_id == id)
                && filter.status.map_or(true, |s| a.status == s)
        }))
    }

    fn update_audit(&self, id: i32, changes: AuditChanges) -> StoreResult<Option<Audit>> {
        let mut t = self.write()?;
        Ok(t.audits.find_mut(id).map(|a| {
            if let Some(status) = changes.status {
                a.status = status;
            }
            if changes.completed_date.is_some() {
                a.completed_date = changes.completed_date;
            }
            if changes.notes.is_some() {
                a.notes = changes.notes;
            }
            if changes.photos.is_some() {
                a.photos = changes.photos;
            }
            if changes.videos.is_some() {
                a.videos = changes.videos;
            }
            if changes.location.is_some() {
                a.location = changes.location;
            }
            if changes.rating.is_some() {
                a.rating = changes.rating;
            }
            if changes.issues.is_some() {
                a.issues = changes.issues;
            }
            a.clone()
        }))
    }

    fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        let mut t = self.write()?;
        if alert.csp_id.is_some_and(|id| !t.csps.contains(id)) {
            return Err(StoreError::InvalidReference("alerts_csp_id_fkey".into()));
        }
        if alert.transaction_id.is_some_and(|id| !t.transactions.contains(id)) {
            return Err(StoreError::InvalidReference("alerts_transaction_id_fkey".into()));
        }
        if alert.assigned_to.is_some_and(|id| !t.users.contains(id)) {
            return Err(StoreError::InvalidReference("alerts_assigned_to_fkey".into()));
        }
        Ok(t.alerts.insert(|id| Alert {
            id,
            csp_id: alert.csp_id,
            transaction_id: alert.transaction_id,
            kind: alert.kind,
            severity: alert.severity,
            message: alert.message,
            status: alert.status,
            assigned_to: alert.assigned_to,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        }))
    }

    fn get_alert(&self, id: i32) -> StoreResult<Option<Alert>> {
        Ok(self.read()?.alerts.find(id))
    }

    fn list_alerts(&self, csp_id: Option<i32>) -> StoreResult<Vec<Alert>> {
        let t = self.read()?;
        Ok(t
            .alerts
            .newest_first(|a| csp_id.map_or(true, |id| a.csp_id == Some(id))))
    }

    fn update_alert_status(&self, id: i32, changes: AlertChanges) -> StoreResult<Option<Alert>> {
        let mut t = self.write()?;
        Ok(t.alerts.find_mut(id).map(|a| {
            a.status = changes.status;
            if changes.assigned_to.is_some() {
                a.assigned_to = changes.assigned_to;
            }
            if changes.resolved_by.is_some() {
                a.resolved_by = changes.resolved_by;
            }
            if changes.resolved_at.is_some() {
                a.resolved_at = changes.resolved_at;
            }
            a.clone()
        }))
    }

    fn create_application(&self, application: NewApplication) -> StoreResult<Application> {
        let mut t = self.write()?;
        Ok(t.applications.insert(|id| Application {
            id,
            first_name: application.first_name,
            last_name: application.last_name,
            email: application.email,
            phone: application.phone,
            aadhaar_number: application.aadhaar_number,
            address: application.address,
            education: application.education,
            photo_url: application.photo_url,
            status: application.status,
            notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }))
    }

    fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<Application>> {
        let t = self.read()?;
        Ok(t
            .applications
            .newest_first(|a| status.map_or(true, |s| a.status == s)))
    }

    fn review_application(
        &self,
        id: i32,
        review: ApplicationReview,
    ) -> StoreResult<Option<Application>> {
        let mut t = self.write()?;
        Ok(t.applications.find_mut(id).map(|a| {
            a.status = review.status;
            a.notes = Some(review.notes);
            a.reviewed_by = Some(review.reviewed_by);
            a.reviewed_at = Some(review.reviewed_at);
            a.clone()
        }))
    }

    fn create_activity_log(&self, entry: NewActivityLog) -> StoreResult<ActivityLog> {
        let mut t = self.write()?;
        Ok(t.activity_logs.insert(|id| ActivityLog {
            id,
            user_id: entry.user_id,
            action: entry.action,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        }))
    }

    fn list_activity_logs(&self, filter: &ActivityFilter) -> StoreResult<Vec<ActivityLog>> {
        let t = self.read()?;
        let mut logs = t.activity_logs.newest_first(|l| {
            filter.user_id.map_or(true, |id| l.user_id == Some(id))
                && filter.action.as_deref().map_or(true, |a| l.action == a)
        });
        logs.truncate(filter.limit);
        Ok(logs)
    }

    fn create_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let mut t = self.write()?;
        Ok(t.notifications.insert(|id| Notification {
            id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            status: notification.status,
            created_at: Utc::now(),
            read_at: None,
        }))
    }

    fn get_notification(&self, id: i32) -> StoreResult<Option<Notification>> {
        Ok(self.read()?.notifications.find(id))
    }

    fn list_notifications_for_user(
        &self,
        user_id: i32,
        status: Option<NotificationStatus>,
    ) -> StoreResult<Vec<Notification>> {
        let t = self.read()?;
        Ok(t.notifications.newest_first(|n| {
            n.user_id == Some(user_id) && status.map_or(true, |s| n.status == s)
        }))
    }

    fn mark_notification_read(&self, id: i32) -> StoreResult<Option<Notification>> {
        let mut t = self.write()?;
        Ok(t.notifications.find_mut(id).map(|n| {
            n.status = NotificationStatus::Read;
            n.read_at = Some(Utc::now());
            n.clone()
        }))
    }
}
