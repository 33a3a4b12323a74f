//! services/api/src/web/auth.rs
//!
//! Registration, login, and logout for patients, doctors, and the admin.
//! A successful login returns an opaque session token; clients send it back in
//! the `token`, `dtoken`, or `atoken` header depending on their role.

use crate::web::response::{message, ok, Body, HandlerResult, HttpError, MessageBody, Success};
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use clinic_core::domain::{Credentials, NewUser, Principal};
use clinic_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// Header names carrying the session token for each role.
pub const PATIENT_TOKEN_HEADER: &str = "token";
pub const DOCTOR_TOKEN_HEADER: &str = "dtoken";
pub const ADMIN_TOKEN_HEADER: &str = "atoken";

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

//=========================================================================================
// Password & Session Helpers
//=========================================================================================

pub fn hash_password(password: &str) -> Result<String, HttpError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            HttpError::internal("Failed to hash password")
        })
}

fn verify_password(password: &str, hashed: &str) -> Result<bool, HttpError> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        HttpError::internal("Authentication error")
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

async fn issue_session(state: &AppState, principal: Principal) -> HandlerResult<String> {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.config.session_ttl;
    state
        .db
        .create_auth_session(&token, principal, expires_at)
        .await?;
    Ok(token)
}

/// Checks a password against the looked-up credentials.
/// Unknown accounts and wrong passwords produce the same error.
fn check_credentials(lookup: PortResult<Credentials>, password: &str) -> HandlerResult<Uuid> {
    let creds = match lookup {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(password, &creds.hashed_password)? {
        return Err(invalid_credentials());
    }
    Ok(creds.id)
}

fn invalid_credentials() -> HttpError {
    HttpError::unauthorized("Invalid credentials")
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/user/register - Create a patient account and log it in
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = Success<TokenResponse>),
        (status = 400, description = "Missing or invalid details"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<RegisterRequest>,
) -> HandlerResult<Json<Success<TokenResponse>>> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(HttpError::bad_request("Missing Details"));
    }
    if !state.validators.is_email(&email) {
        return Err(HttpError::bad_request("Enter a valid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(HttpError::bad_request("Enter a strong password"));
    }

    let hashed = hash_password(&req.password)?;
    let user = state
        .db
        .create_user(NewUser {
            name: name.to_string(),
            email: Some(email),
            hashed_password: Some(hashed),
            phone: None,
            gender: None,
            dob: None,
        })
        .await?;
    info!(user_id = %user.id, "Registered patient");

    let token = issue_session(&state, Principal::Patient(user.id)).await?;
    Ok(ok(TokenResponse { token }))
}

/// POST /api/user/login - Patient login
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Success<TokenResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn user_login_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<LoginRequest>,
) -> HandlerResult<Json<Success<TokenResponse>>> {
    let email = req.email.trim().to_lowercase();
    let lookup = state.db.get_user_credentials(&email).await;
    let user_id = check_credentials(lookup, &req.password)?;
    let token = issue_session(&state, Principal::Patient(user_id)).await?;
    Ok(ok(TokenResponse { token }))
}

/// POST /api/doctor/login - Doctor login
#[utoipa::path(
    post,
    path = "/api/doctor/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Success<TokenResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn doctor_login_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<LoginRequest>,
) -> HandlerResult<Json<Success<TokenResponse>>> {
    let email = req.email.trim().to_lowercase();
    let lookup = state.db.get_doctor_credentials(&email).await;
    let doctor_id = check_credentials(lookup, &req.password)?;
    let token = issue_session(&state, Principal::Doctor(doctor_id)).await?;
    Ok(ok(TokenResponse { token }))
}

/// POST /api/admin/login - Admin login against the configured credentials
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Success<TokenResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<LoginRequest>,
) -> HandlerResult<Json<Success<TokenResponse>>> {
    let email_matches = req
        .email
        .trim()
        .eq_ignore_ascii_case(&state.config.admin_email);
    if !email_matches || req.password != state.config.admin_password {
        return Err(invalid_credentials());
    }
    let token = issue_session(&state, Principal::Admin).await?;
    Ok(ok(TokenResponse { token }))
}

/// POST /api/user/logout - Invalidate the session named by any role header
#[utoipa::path(
    post,
    path = "/api/user/logout",
    responses(
        (status = 200, description = "Logout successful", body = Success<MessageBody>),
        (status = 401, description = "No session token supplied")
    ),
    params(
        ("token" = Option<String>, Header, description = "Patient session token"),
        ("dtoken" = Option<String>, Header, description = "Doctor session token"),
        ("atoken" = Option<String>, Header, description = "Admin session token")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HandlerResult<Json<Success<MessageBody>>> {
    let session_id = [PATIENT_TOKEN_HEADER, DOCTOR_TOKEN_HEADER, ADMIN_TOKEN_HEADER]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .ok_or_else(|| HttpError::unauthorized("Not authorized, login again"))?;

    state.db.delete_auth_session(session_id).await?;
    Ok(message("Logged out"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify_only_the_original() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("battery staple", &hashed).unwrap());
    }
}
