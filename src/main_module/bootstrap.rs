//! Bootstrap and application initialization logic

use anyhow::{anyhow, Context, Result};
use log::{info, trace, warn};
use std::sync::Arc;

use crate::core::config::{AppConfig, BootstrapAdmin};
use crate::core::shared::models::{Role, UserStatus};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{create_conn, run_migrations};
use crate::core::storage::{MemoryStore, PgStore, PortalStore};
use crate::security::password::PasswordHasher;
use crate::users::{register_user, UserDraft};

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Picks PostgreSQL when `DATABASE_URL` is configured, the in-memory store otherwise.
pub fn init_store(config: &AppConfig) -> Result<Arc<dyn PortalStore>> {
    let Some(database) = &config.database else {
        warn!("DATABASE_URL not set, using in-memory storage; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    trace!("Creating database connection pool (size {})", database.pool_size);
    let pool = create_conn(database).context("Failed to create database pool")?;
    run_migrations(&pool).map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
    info!("Database ready");

    Ok(Arc::new(PgStore::new(pool)))
}

/// Creates the configured admin account unless its username is already taken.
pub async fn seed_admin(
    store: &dyn PortalStore,
    passwords: &PasswordHasher,
    admin: &BootstrapAdmin,
) -> Result<bool> {
    if store
        .get_user_by_username(&admin.username)
        .context("Failed to look up bootstrap admin")?
        .is_some()
    {
        trace!("Bootstrap admin '{}' already exists", admin.username);
        return Ok(false);
    }

    passwords
        .policy()
        .check(&admin.password)
        .map_err(|e| anyhow!("Bootstrap admin password rejected: {e}"))?;

    let draft = UserDraft {
        username: admin.username.clone(),
        password: admin.password.clone(),
        email: admin.email.clone(),
        full_name: "Administrator".to_string(),
        phone: None,
        role: Role::Admin,
        status: UserStatus::Active,
    };
    let user = register_user(store, passwords, draft)
        .await
        .map_err(|e| anyhow!("Failed to create bootstrap admin: {e}"))?;
    info!("Created bootstrap admin '{}' (id {})", user.username, user.id);
    Ok(true)
}

pub async fn build_state(config: AppConfig) -> Result<Arc<AppState>> {
    let store = init_store(&config)?;
    let passwords = PasswordHasher::with_defaults()?;

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(store.as_ref(), &passwords, admin).await?;
    }

    Ok(Arc::new(AppState::new(store, passwords, config)))
}
