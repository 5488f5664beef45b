//! Bearer token extractors
//!
//! A request without a valid token gets 401 before any query runs. A valid
//! token is then checked against the account: suspended, deactivated or
//! deleted users get 401, and the stored role, not the one in the token,
//! decides what the caller may do.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::jwt::JwtError;
use crate::db;
use crate::domain::aggregates::{Role, UserStatus};
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: uuid::Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool { self.role.is_staff() }

    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = self.role.as_str(), "insufficient role");
            Err(ApiError::Forbidden("You do not have permission to perform this action"))
        }
    }
}

/// Applies the stored account state to a token's identity.
fn admit(id: uuid::Uuid, email: String, access: Option<(Role, UserStatus)>) -> Result<AuthUser, ApiError> {
    match access {
        Some((role, UserStatus::Active)) => Ok(AuthUser { id, email, role }),
        Some((_, status)) => {
            tracing::warn!(user_id = %id, status = status.as_str(), "token for inactive account");
            Err(ApiError::Unauthorized("Account is not active"))
        }
        None => {
            tracing::warn!(user_id = %id, "token for unknown account");
            Err(ApiError::Unauthorized("Not authorized, user not found"))
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let Some(token) = bearer(parts) else {
            tracing::debug!(uri = %parts.uri, "missing bearer token");
            return Err(ApiError::Unauthorized("Not authorized, no token"));
        };

        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::debug!(uri = %parts.uri, error = %e, "token rejected");
            match e {
                JwtError::Expired => ApiError::Unauthorized("Token expired"),
                _ => ApiError::Unauthorized("Not authorized, token failed"),
            }
        })?;

        let access = db::users::access(&state.db, claims.sub).await?;
        let user = admit(claims.sub, claims.email, access)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Present when the request carries a valid token. A malformed or expired
/// token is still rejected rather than silently treated as a guest.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer(parts).is_none() {
            return Ok(MaybeUser(None));
        }
        AuthUser::from_request_parts(parts, state).await.map(|u| MaybeUser(Some(u)))
    }
}

/// Rejects on the token's role before the account lookup; the stored role is
/// checked again once the account is loaded.
async fn with_role(parts: &mut Parts, state: &AppState, allowed: &[Role]) -> Result<AuthUser, ApiError> {
    if let Some(token) = bearer(parts) {
        if let Ok(claims) = state.jwt.verify(token) {
            if !allowed.contains(&claims.role) {
                tracing::warn!(user_id = %claims.sub, role = claims.role.as_str(), "insufficient role");
                return Err(ApiError::Forbidden("You do not have permission to perform this action"));
            }
        }
    }
    let user = AuthUser::from_request_parts(parts, state).await?;
    user.require(allowed)?;
    Ok(user)
}

/// Admin or manager
#[derive(Debug, Clone)]
pub struct Staff(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        with_role(parts, state, &[Role::Admin, Role::Manager]).await.map(Staff)
    }
}

#[derive(Debug, Clone)]
pub struct Admin(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        with_role(parts, state, &[Role::Admin]).await.map(Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_stored_role_wins_over_token() {
        let id = Uuid::now_v7();
        let user = admit(id, "m@example.ge".into(), Some((Role::Customer, UserStatus::Active))).unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(!user.is_staff());
        assert!(matches!(user.require(&[Role::Admin, Role::Manager]), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_inactive_accounts_are_turned_away() {
        let id = Uuid::now_v7();
        for status in [UserStatus::Suspended, UserStatus::Inactive] {
            let r = admit(id, "s@example.ge".into(), Some((Role::Admin, status)));
            assert!(matches!(r, Err(ApiError::Unauthorized("Account is not active"))));
        }
        assert!(matches!(admit(id, "gone@example.ge".into(), None), Err(ApiError::Unauthorized(_))));
    }
}
