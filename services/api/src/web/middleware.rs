//! services/api/src/web/middleware.rs
//!
//! Role-checking middleware for protected routes.

use crate::web::auth::{ADMIN_TOKEN_HEADER, DOCTOR_TOKEN_HEADER, PATIENT_TOKEN_HEADER};
use crate::web::response::HttpError;
use crate::web::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use clinic_core::domain::Principal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Id of the authenticated patient, inserted into request extensions.
#[derive(Clone, Copy, Debug)]
pub struct PatientId(pub Uuid);

/// Id of the authenticated doctor, inserted into request extensions.
#[derive(Clone, Copy, Debug)]
pub struct DoctorId(pub Uuid);

/// Reads the session token from `header` and resolves it to a principal.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    header: &str,
) -> Result<Principal, HttpError> {
    let session_id = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HttpError::unauthorized("Not authorized, login again"))?;

    state.db.validate_auth_session(session_id).await.map_err(|e| {
        debug!("Rejected session from {} header: {}", header, e);
        HttpError::unauthorized("Not authorized, login again")
    })
}

/// Requires a patient session in the `token` header and exposes [`PatientId`].
pub async fn require_patient(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let principal = authenticate(&state, req.headers(), PATIENT_TOKEN_HEADER).await?;
    match principal {
        Principal::Patient(id) => {
            req.extensions_mut().insert(PatientId(id));
            Ok(next.run(req).await)
        }
        _ => Err(HttpError::unauthorized("Not authorized, login again")),
    }
}

/// Requires a doctor session in the `dtoken` header and exposes [`DoctorId`].
pub async fn require_doctor(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let principal = authenticate(&state, req.headers(), DOCTOR_TOKEN_HEADER).await?;
    match principal {
        Principal::Doctor(id) => {
            req.extensions_mut().insert(DoctorId(id));
            Ok(next.run(req).await)
        }
        _ => Err(HttpError::unauthorized("Not authorized, login again")),
    }
}

/// Requires an admin session in the `atoken` header.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let principal = authenticate(&state, req.headers(), ADMIN_TOKEN_HEADER).await?;
    match principal {
        Principal::Admin => Ok(next.run(req).await),
        _ => Err(HttpError::unauthorized("Not authorized, login again")),
    }
}
