//! Request extractors for the session cookie and client metadata.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::Role;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::client_ip;
use crate::security::session::{extract_session_id_from_cookie, SessionUser};

/// The caller behind a valid session. Extraction fails with 401 and
/// refreshes the idle deadline on success.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub user: SessionUser,
}

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn require_role(&self, roles: &[Role]) -> ApiResult<()> {
        if self.user.role.is_one_of(roles) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Unauthorized"))
        }
    }
}

pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| extract_session_id_from_cookie(h, cookie_name))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session_id = session_id_from_headers(&parts.headers, &state.sessions.config().cookie_name)
            .ok_or(ApiError::Unauthorized)?;

        let session = state
            .sessions
            .validate_session(&session_id)
            .await
            .map_err(|e| {
                warn!("Session lookup failed: {e}");
                ApiError::Unauthorized
            })?
            .ok_or(ApiError::Unauthorized)?;

        if let Err(e) = state.sessions.touch_session(&session_id).await {
            warn!("Failed to refresh session: {e}");
        }

        Ok(Self {
            session_id,
            user: session.user,
        })
    }
}

/// Client address and user agent recorded with activity log entries.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            ip_address: client_ip(&parts.headers),
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .header(header::USER_AGENT, "portal-test/1.0")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_session_id_from_cookie_header() {
        let p = parts("theme=dark; csp_session=abc");
        assert_eq!(session_id_from_headers(&p.headers, "csp_session").as_deref(), Some("abc"));
        assert_eq!(session_id_from_headers(&p.headers, "other_cookie"), None);
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            session_id: "s".into(),
            user: SessionUser {
                id: 1,
                username: "bank1".into(),
                email: "bank1@portal.test".into(),
                role: Role::Bank,
                full_name: "Bank Officer".into(),
            },
        };
        assert!(user.require_role(&[Role::Admin, Role::Bank]).is_ok());
        let err = user.require_role(&[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_request_meta() {
        let mut p = parts("");
        p.headers.insert("x-real-ip", "192.0.2.10".parse().unwrap());
        let meta = RequestMeta::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(meta.ip_address.as_deref(), Some("192.0.2.10"));
        assert_eq!(meta.user_agent.as_deref(), Some("portal-test/1.0"));
    }
}
