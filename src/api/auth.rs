//! Account endpoints: registration, login, profile and password management

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{created, message, ok, ok_with, ApiResponse, ValidJson};
use crate::auth::{generate_reset_token, hash_password, verify_password, AuthUser, PasswordError};
use crate::db::{self, users::NewUser};
use crate::domain::aggregates::user::{Address, Preferences};
use crate::domain::aggregates::{Role, User};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Language;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::EcommerceError;

#[derive(Debug, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

fn password_failure(e: PasswordError) -> ApiError {
    tracing::error!(error = %e, "password hashing failed");
    ApiError::Internal
}

fn issue_session(state: &AppState, user: User) -> ApiResult<Session> {
    let token = state.jwt.issue(user.id, &user.email, user.role).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "failed to sign token");
        ApiError::Internal
    })?;
    Ok(Session { user, token })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub language: Option<Language>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Session>>)> {
    if db::users::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists with this email".into()));
    }

    let password_hash = hash_password(&req.password).map_err(password_failure)?;
    let preferences = Preferences { language: req.language.unwrap_or_default(), ..Preferences::default() };
    let user = db::users::insert(
        &state.db,
        NewUser {
            first_name: &req.first_name,
            last_name: &req.last_name,
            email: &req.email,
            phone: req.phone.as_deref(),
            password_hash: &password_hash,
            role: Role::Customer,
            preferences,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "user registered");
    state.events.publish(DomainEvent::UserRegistered {
        user_id: user.id,
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        language: user.preferences.language,
    });

    Ok(created("User registered successfully", issue_session(&state, user)?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<ApiResponse<Session>>> {
    let Some(user) = db::users::find_by_email(&state.db, &req.email).await? else {
        return Err(ApiError::Unauthorized("Invalid email or password"));
    };
    if !verify_password(&req.password, &user.password_hash).map_err(password_failure)? {
        tracing::debug!(user_id = %user.id, "wrong password");
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }
    if !user.can_sign_in() {
        return Err(ApiError::Unauthorized("Account is not active"));
    }

    db::users::record_login(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(ok_with("Login successful", issue_session(&state, user)?))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<ApiResponse<User>>> {
    let user = db::users::find_by_id(&state.db, auth.id).await?.ok_or(EcommerceError::NotFound("User"))?;
    Ok(ok(user))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub preferences: Option<Preferences>,
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(req): ValidJson<ProfileRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let update = db::users::ProfileUpdate {
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        address: req.address,
        preferences: req.preferences,
    };
    let user = db::users::update_profile(&state.db, auth.id, update).await?.ok_or(EcommerceError::NotFound("User"))?;
    Ok(ok_with("Profile updated successfully", user))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let user = db::users::find_by_id(&state.db, auth.id).await?.ok_or(EcommerceError::NotFound("User"))?;
    if !verify_password(&req.current_password, &user.password_hash).map_err(password_failure)? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password).map_err(password_failure)?;
    let mut conn = state.db.acquire().await?;
    db::users::set_password(&mut conn, user.id, &password_hash).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok(message("Password changed successfully"))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(auth: AuthUser) -> Json<ApiResponse<()>> {
    tracing::debug!(user_id = %auth.id, "logout");
    message("Logged out successfully")
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

/// POST /api/auth/forgot-password
///
/// Answers the same way whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    match db::users::find_by_email(&state.db, &req.email).await? {
        Some(user) if user.can_sign_in() => {
            let token = generate_reset_token();
            db::password_resets::create(&state.db, user.id, &token).await?;
            let reset_url = format!("{}/reset-password?token={}", state.config.frontend_url.trim_end_matches('/'), token);
            tracing::info!(user_id = %user.id, "password reset requested");
            state.events.publish(DomainEvent::PasswordResetRequested { user_id: user.id, email: user.email, reset_url });
        }
        _ => tracing::debug!("password reset for unknown or inactive account"),
    }
    Ok(message("If that email is registered, a password reset link has been sent"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let password_hash = hash_password(&req.password).map_err(password_failure)?;

    let mut tx = state.db.begin().await?;
    let Some((token_id, user_id)) = db::password_resets::find_valid(&mut tx, &req.token).await? else {
        return Err(ApiError::bad_request("Invalid or expired reset token"));
    };
    db::users::set_password(&mut tx, user_id, &password_hash).await?;
    db::password_resets::mark_used(&mut tx, token_id).await?;
    tx.commit().await?;

    tracing::info!(%user_id, "password reset");
    Ok(message("Password has been reset successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_rules() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Nino",
            "lastName": "",
            "email": "nino@example.ge",
            "password": "secret1",
            "language": "ka"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.field_errors().contains_key("last_name"));
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_unknown_language_is_rejected_by_serde() {
        let parsed = serde_json::from_value::<RegisterRequest>(serde_json::json!({
            "firstName": "A", "lastName": "B", "email": "a@b.ge", "password": "secret1", "language": "de"
        }));
        assert!(parsed.is_err());
    }
}
