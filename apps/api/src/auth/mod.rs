pub mod handlers;
pub mod password;
pub mod tokens;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

/// Authenticated user, extracted from the `Authorization: Bearer` header.
/// Handlers that take an `AuthUser` argument reject unauthenticated requests
/// with 401 before their body runs.
pub struct AuthUser(pub UserRow);

impl AuthUser {
    /// Role gate for coordinator/admin surfaces. 403 unless the caller's
    /// role is one of `allowed`.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AppError> {
        if allowed.contains(&self.0.role.as_str()) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        let user = tokens::lookup_user(&state.db, token)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::Unauthorized)?;

        if !user.active {
            return Err(AppError::Forbidden);
        }
        Ok(AuthUser(user))
    }
}
