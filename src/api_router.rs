//! API Router
//!
//! Combines the routes of every resource module into one router.

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

/// Configure all API routes from all modules
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::main_module::configure_health_routes())
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::applications::configure_application_routes())
        .merge(crate::csps::configure_csp_routes())
        .merge(crate::transactions::configure_transaction_routes())
        .merge(crate::audits::configure_audit_routes())
        .merge(crate::alerts::configure_alert_routes())
        .merge(crate::notifications::configure_notification_routes())
        .merge(crate::activity::configure_activity_routes())
        .merge(crate::users::configure_user_routes())
        .merge(crate::export::configure_export_routes())
        .merge(crate::stats::configure_stats_routes())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    configure_api_routes().with_state(state)
}
