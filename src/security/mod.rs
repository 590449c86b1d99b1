pub mod auth;
pub mod cors;
pub mod password;
pub mod session;
pub mod validation;

pub use auth::{CurrentUser, RequestMeta};
pub use password::{Argon2Config, PasswordHasher, PasswordPolicy};
pub use session::{
    InMemorySessionStore, Session, SessionConfig, SessionManager, SessionStore, SessionUser,
};
pub use validation::{ValidationError, Validator};
