use anyhow::Result;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::storage::{MemoryStore, PortalStore};
use crate::security::password::{Argon2Config, PasswordHasher, PasswordPolicy};
use crate::security::session::{InMemorySessionStore, SessionManager};

pub struct AppState {
    pub store: Arc<dyn PortalStore>,
    pub sessions: SessionManager<InMemorySessionStore>,
    pub passwords: PasswordHasher,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn PortalStore>, passwords: PasswordHasher, config: AppConfig) -> Self {
        let sessions = SessionManager::new(InMemorySessionStore::new(), config.session.clone());
        Self {
            store,
            sessions,
            passwords,
            config,
        }
    }

    /// Fresh in-memory state with cheap password hashing, for tests and demos.
    pub fn in_memory(config: AppConfig) -> Result<Self> {
        let passwords = PasswordHasher::new(Argon2Config::minimal(), PasswordPolicy::default())?;
        Ok(Self::new(Arc::new(MemoryStore::new()), passwords, config))
    }

    pub fn store(&self) -> &dyn PortalStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &"dyn PortalStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
