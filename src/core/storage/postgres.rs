use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use super::{ActivityFilter, AuditFilter, PortalStore, StoreError, StoreResult};
use crate::core::shared::models::{
    activity_logs, alerts, applications, audits, csps, notifications, transactions, users,
    ActivityLog, Alert, AlertChanges, Application, ApplicationReview, ApplicationStatus, Audit,
    AuditChanges, Csp, CspChanges, NewActivityLog, NewAlert, NewApplication, NewAudit, NewCsp,
    NewNotification, NewTransaction, NewUser, Notification, NotificationStatus, Role,
    Transaction, User, UserStatus,
};
use crate::core::shared::utils::DbPool;

type Conn = PooledConnection<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<Conn> {
        self.pool.get().map_err(StoreError::from)
    }
}

impl PortalStore for PgStore {
    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let mut conn = self.conn()?;
        let mut query = users::table
            .select(User::as_select())
            .order((users::created_at.desc(), users::id.desc()))
            .into_boxed();
        if let Some(role) = role {
            query = query.filter(users::role.eq(role));
        }
        Ok(query.load(&mut conn)?)
    }

    fn update_user_status(&self, id: i32, status: UserStatus) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set(users::status.eq(status))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn update_user_password(&self, id: i32, password_hash: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set(users::password_hash.eq(password_hash))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn create_csp(&self, csp: NewCsp) -> StoreResult<Csp> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(csps::table)
            .values(&csp)
            .returning(Csp::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_csp(&self, id: i32) -> StoreResult<Option<Csp>> {
        let mut conn = self.conn()?;
        Ok(csps::table
            .find(id)
            .select(Csp::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn get_csp_by_user_id(&self, user_id: i32) -> StoreResult<Option<Csp>> {
        let mut conn = self.conn()?;
        Ok(csps::table
            .filter(csps::user_id.eq(user_id))
            .select(Csp::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_csps(&self) -> StoreResult<Vec<Csp>> {
        let mut conn = self.conn()?;
        Ok(csps::table
            .select(Csp::as_select())
            .order((csps::created_at.desc(), csps::id.desc()))
            .load(&mut conn)?)
    }

    fn update_csp(&self, id: i32, changes: CspChanges) -> StoreResult<Option<Csp>> {
        if changes.is_empty() {
            return self.get_csp(id);
        }
        let mut conn = self.conn()?;
        Ok(diesel::update(csps::table.find(id))
            .set(&changes)
            .returning(Csp::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn create_transaction(&self, tx: NewTransaction) -> StoreResult<Transaction> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(transactions::table)
            .values(&tx)
            .returning(Transaction::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_transaction(&self, id: i32) -> StoreResult<Option<Transaction>> {
        let mut conn = self.conn()?;
        Ok(transactions::table
            .find(id)
            .select(Transaction::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_transactions(&self, csp_id: Option<i32>) -> StoreResult<Vec<Transaction>> {
        let mut conn = self.conn()?;
        let mut query = transactions::table
            .select(Transaction::as_select())
            .order((transactions::created_at.desc(), transactions::id.desc()))
            .into_boxed();
        if let Some(csp_id) = csp_id {
            query = query.filter(transactions::csp_id.eq(csp_id));
        }
        Ok(query.load(&mut conn)?)
    }

    fn create_audit(&self, audit: NewAudit) -> StoreResult<Audit> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(audits::table)
            .values(&audit)
            .returning(Audit::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_audit(&self, id: i32) -> StoreResult<Option<Audit>> {
        let mut conn = self.conn()?;
        Ok(audits::table
            .find(id)
            .select(Audit::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_audits(&self, filter: &AuditFilter) -> StoreResult<Vec<Audit>> {
        let mut conn = self.conn()?;
        let mut query = audits::table
            .select(Audit::as_select())
            .order((audits::created_at.desc(), audits::id.desc()))
            .into_boxed();
        if let Some(csp_id) = filter.csp_id {
            query = query.filter(audits::csp_id.eq(csp_id));
        }
        if let Some(auditor_id) = filter.auditor_id {
            query = query.filter(audits::auditor_id.eq(auditor_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(audits::status.eq(status));
        }
        Ok(query.load(&mut conn)?)
    }

    fn update_audit(&self, id: i32, changes: AuditChanges) -> StoreResult<Option<Audit>> {
        if changes.is_empty() {
            return self.get_audit(id);
        }
        let mut conn = self.conn()?;
        Ok(diesel::update(audits::table.find(id))
            .set(&changes)
            .returning(Audit::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(alerts::table)
            .values(&alert)
            .returning(Alert::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_alert(&self, id: i32) -> StoreResult<Option<Alert>> {
        let mut conn = self.conn()?;
        Ok(alerts::table
            .find(id)
            .select(Alert::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_alerts(&self, csp_id: Option<i32>) -> StoreResult<Vec<Alert>> {
        let mut conn = self.conn()?;
        let mut query = alerts::table
            .select(Alert::as_select())
            .order((alerts::created_at.desc(), alerts::id.desc()))
            .into_boxed();
        if let Some(csp_id) = csp_id {
            query = query.filter(alerts::csp_id.eq(csp_id));
        }
        Ok(query.load(&mut conn)?)
    }

    fn update_alert_status(&self, id: i32, changes: AlertChanges) -> StoreResult<Option<Alert>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(alerts::table.find(id))
            .set(&changes)
            .returning(Alert::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn create_application(&self, application: NewApplication) -> StoreResult<Application> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(applications::table)
            .values(&application)
            .returning(Application::as_returning())
            .get_result(&mut conn)?)
    }

    fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<Application>> {
        let mut conn = self.conn()?;
        let mut query = applications::table
            .select(Application::as_select())
            .order((applications::created_at.desc(), applications::id.desc()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(applications::status.eq(status));
        }
        Ok(query.load(&mut conn)?)
    }

    fn review_application(
        &self,
        id: i32,
        review: ApplicationReview,
    ) -> StoreResult<Option<Application>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(applications::table.find(id))
            .set(&review)
            .returning(Application::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn create_activity_log(&self, entry: NewActivityLog) -> StoreResult<ActivityLog> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(activity_logs::table)
            .values(&entry)
            .returning(ActivityLog::as_returning())
            .get_result(&mut conn)?)
    }

    fn list_activity_logs(&self, filter: &ActivityFilter) -> StoreResult<Vec<ActivityLog>> {
        let mut conn = self.conn()?;
        let mut query = activity_logs::table
            .select(ActivityLog::as_select())
            .order((activity_logs::created_at.desc(), activity_logs::id.desc()))
            .limit(filter.limit as i64)
            .into_boxed();
        if let Some(user_id) = filter.user_id {
            query = query.filter(activity_logs::user_id.eq(user_id));
        }
        if let Some(action) = &filter.action {
            query = query.filter(activity_logs::action.eq(action.clone()));
        }
        Ok(query.load(&mut conn)?)
    }

    fn create_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(notifications::table)
            .values(&notification)
            .returning(Notification::as_returning())
            .get_result(&mut conn)?)
    }

    fn get_notification(&self, id: i32) -> StoreResult<Option<Notification>> {
        let mut conn = self.conn()?;
        Ok(notifications::table
            .find(id)
            .select(Notification::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_notifications_for_user(
        &self,
        user_id: i32,
        status: Option<NotificationStatus>,
    ) -> StoreResult<Vec<Notification>> {
        let mut conn = self.conn()?;
        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .select(Notification::as_select())
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(notifications::status.eq(status));
        }
        Ok(query.load(&mut conn)?)
    }

    fn mark_notification_read(&self, id: i32) -> StoreResult<Option<Notification>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(notifications::table.find(id))
            .set((
                notifications::status.eq(NotificationStatus::Read),
                notifications::read_at.eq(Some(Utc::now())),
            ))
            .returning(Notification::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }
}
