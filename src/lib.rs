pub mod activity;
pub mod alerts;
pub mod api_router;
pub mod applications;
pub mod audits;
pub mod auth;
pub mod core;
pub mod csps;
pub mod export;
pub mod main_module;
pub mod notifications;
pub mod security;
pub mod stats;
pub mod transactions;
pub mod users;

pub use crate::core::shared::state::AppState;
