//! Shared application state and caller identity extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use banyan_core::Error;
use banyan_db::Database;

use crate::error::ApiError;

/// Header naming the authenticated user. Identity management is outside
/// this service; the deployment's proxy is trusted to set it.
pub const USER_HEADER: &str = "x-banyan-user";

/// Header flagging administrative callers.
pub const ADMIN_HEADER: &str = "x-banyan-admin";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// The authenticated caller, extracted from trusted proxy headers.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub is_admin: bool,
}

impl Caller {
    /// Admin-only gate.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError(Error::Forbidden(
                "administrator role required".to_string(),
            )))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError(Error::Forbidden(format!("missing {USER_HEADER} header"))))?;

        let is_admin = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Caller { user_id, is_admin })
    }
}
