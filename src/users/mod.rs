use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{NewUser, Role, User, UserStatus};
use crate::core::shared::state::AppState;
use crate::core::storage::{PortalStore, StoreError};
use crate::security::auth::{CurrentUser, RequestMeta};
use crate::security::password::PasswordHasher;
use crate::security::validation::{
    validate_choice, validate_email, validate_optional_choice, validate_phone, validate_required,
    validate_username, ValidationError, Validator,
};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin])?;

    let role = query
        .role
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(|r| validate_choice::<Role>(r, "role", &Role::tokens()))
        .transpose()
        .map_err(|e| ApiError::from(vec![e]))?;

    let users = state
        .store()
        .list_users(role)
        .map_err(ApiError::internal("Failed to retrieve users"))?;

    Ok(Json(serde_json::json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

/// A validated user whose password has not been hashed yet.
#[derive(Debug)]
pub struct UserDraft {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

impl CreateUserRequest {
    pub fn validate(self, hasher: &PasswordHasher) -> Result<UserDraft, Vec<ValidationError>> {
        let mut v = Validator::new();

        let username = v.take(validate_required(self.username.as_deref(), "username"));
        if let Some(username) = username {
            v.check(validate_username(username));
        }
        let password = v.take(
            self.password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ValidationError::Required("password".into())),
        );
        if let Some(password) = password {
            v.check(hasher.policy().check(password));
        }
        let email = v.take(validate_required(self.email.as_deref(), "email"));
        if let Some(email) = email {
            v.check(validate_email(email, "email"));
        }
        let full_name = v.take(validate_required(self.full_name.as_deref(), "fullName"));
        let phone = self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            v.check(validate_phone(phone, "phone"));
        }
        let role = v.take(validate_optional_choice(
            self.role.as_deref(),
            "role",
            &Role::tokens(),
            Role::Csp,
        ));
        let status = v.take(validate_optional_choice(
            self.status.as_deref(),
            "status",
            &UserStatus::tokens(),
            UserStatus::Active,
        ));

        let owned = |value: Option<&str>| value.map(str::to_string).unwrap_or_default();
        let draft = UserDraft {
            username: owned(username),
            password: owned(password),
            email: owned(email),
            full_name: owned(full_name),
            phone: phone.map(str::to_string),
            role: role.unwrap_or(Role::Csp),
            status: status.unwrap_or(UserStatus::Active),
        };

        v.finish().map(|()| draft)
    }
}

fn conflict_message(err: &StoreError) -> Option<&'static str> {
    if err.is_conflict_on("email") {
        Some("Email already exists")
    } else if err.is_conflict_on("username") {
        Some("Username already exists")
    } else {
        None
    }
}

/// Checks uniqueness, hashes the password and inserts the user.
pub async fn register_user(
    store: &dyn PortalStore,
    hasher: &PasswordHasher,
    draft: UserDraft,
) -> ApiResult<User> {
    if store
        .get_user_by_username(&draft.username)
        .map_err(ApiError::internal("Failed to create user"))?
        .is_some()
    {
        return Err(ApiError::conflict("Username already exists"));
    }
    if store
        .get_user_by_email(&draft.email)
        .map_err(ApiError::internal("Failed to create user"))?
        .is_some()
    {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash = hasher
        .spawn_hash(&draft.password)
        .await
        .map_err(|e| ApiError::unexpected("Failed to create user", e))?;

    store
        .create_user(NewUser {
            username: draft.username,
            password_hash,
            email: draft.email,
            full_name: draft.full_name,
            phone: draft.phone,
            role: draft.role,
            status: draft.status,
        })
        .map_err(|e| match conflict_message(&e) {
            Some(message) => ApiError::conflict(message),
            None => ApiError::internal("Failed to create user")(e),
        })
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    user.require_role(&[Role::Admin])?;
    let draft = req.validate(&state.passwords)?;

    let store = state.store();
    let created = register_user(store, &state.passwords, draft).await?;

    activity::record(
        store,
        Some(user.id()),
        "create_user",
        serde_json::json!({ "userId": created.id, "role": created.role }),
        &meta,
    );

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "user": created }))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub status: Option<String>,
}

pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&[Role::Admin])?;

    let status = req
        .status
        .as_deref()
        .and_then(|s| s.parse::<UserStatus>().ok())
        .ok_or_else(|| ApiError::bad_request("Valid status is required"))?;

    let store = state.store();
    let updated = store
        .update_user_status(id, status)
        .map_err(ApiError::internal("Failed to update user"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if status != UserStatus::Active {
        match state.sessions.revoke_all_user_sessions(updated.id).await {
            Ok(count) => info!("User {} set to {status}, revoked {count} sessions", updated.id),
            Err(e) => warn!("Failed to revoke sessions for user {}: {e}", updated.id),
        }
    }

    activity::record(
        store,
        Some(user.id()),
        "update_user_status",
        serde_json::json!({ "userId": updated.id, "status": status }),
        &meta,
    );

    Ok(Json(serde_json::json!({ "user": updated })))
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", patch(update_user_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStore;
    use crate::security::password::{Argon2Config, PasswordPolicy};

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(Argon2Config::minimal(), PasswordPolicy::default()).unwrap()
    }

    fn request(username: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: Some(username.into()),
            password: Some("s3cure-pass".into()),
            email: Some(email.into()),
            full_name: Some("Meena Kumari".into()),
            phone: None,
            role: Some("auditor".into()),
            status: None,
        }
    }

    #[test]
    fn test_validation_defaults() {
        let mut req = request("meena", "meena@portal.test");
        req.role = None;
        let draft = req.validate(&hasher()).unwrap();
        assert_eq!(draft.role, Role::Csp);
        assert_eq!(draft.status, UserStatus::Active);
    }

    #[test]
    fn test_validation_errors() {
        let mut req = request("9lives", "meena@portal.test");
        req.password = Some("short".into());
        req.role = Some("root".into());
        let errors = req.validate(&hasher()).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, vec!["username", "password", "role"]);
    }

    #[tokio::test]
    async fn test_register_hashes_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let hasher = hasher();

        let draft = request("meena", "meena@portal.test").validate(&hasher).unwrap();
        let user = register_user(&store, &hasher, draft).await.unwrap();
        assert_ne!(user.password_hash, "s3cure-pass");
        assert!(hasher.verify("s3cure-pass", &user.password_hash).unwrap());

        let dup_name = request("meena", "other@portal.test").validate(&hasher).unwrap();
        let err = register_user(&store, &hasher, dup_name).await.unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");

        let dup_email = request("meena2", "meena@portal.test").validate(&hasher).unwrap();
        let err = register_user(&store, &hasher, dup_email).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
    }

    #[tokio::test]
    async fn test_password_hash_is_not_serialized() {
        let store = MemoryStore::new();
        let hasher = hasher();
        let draft = request("meena", "meena@portal.test").validate(&hasher).unwrap();
        let user = register_user(&store, &hasher, draft).await.unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "Meena Kumari");
        assert_eq!(json["role"], "auditor");
    }
}
