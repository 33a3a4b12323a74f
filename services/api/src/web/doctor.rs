//! services/api/src/web/doctor.rs
//!
//! The public doctor list and the endpoints a logged-in doctor uses.

use crate::web::middleware::DoctorId;
use crate::web::response::{
    appointment_views, message, ok, AddressView, AppointmentListResponse, Body,
    DoctorDashboardView, DoctorView, HandlerResult, HttpError, MessageBody, Success,
};
use crate::web::state::AppState;
use crate::web::user::AppointmentIdRequest;
use axum::{extract::State, Extension, Json};
use clinic_core::domain::DoctorProfileUpdate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DoctorListResponse {
    pub doctors: Vec<DoctorView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfileResponse {
    pub profile_data: DoctorView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDashboardResponse {
    pub dash_data: DoctorDashboardView,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateDoctorProfileRequest {
    pub fees: i32,
    #[serde(default)]
    pub address: AddressView,
    pub available: bool,
}

/// GET /api/doctor/list - Every doctor, for the public listing
#[utoipa::path(
    get,
    path = "/api/doctor/list",
    responses((status = 200, description = "All doctors", body = Success<DoctorListResponse>))
)]
pub async fn list_doctors_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Json<Success<DoctorListResponse>>> {
    let doctors = state.db.list_doctors().await?;
    Ok(ok(DoctorListResponse {
        doctors: doctors.into_iter().map(DoctorView::from).collect(),
    }))
}

/// GET /api/doctor/appointments
#[utoipa::path(
    get,
    path = "/api/doctor/appointments",
    responses(
        (
            status = 200,
            description = "The doctor's appointments, newest first",
            body = Success<AppointmentListResponse>
        )
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn doctor_appointments_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
) -> HandlerResult<Json<Success<AppointmentListResponse>>> {
    let appointments = state.booking.appointments_for_doctor(doctor_id).await?;
    Ok(ok(AppointmentListResponse {
        appointments: appointment_views(appointments),
    }))
}

/// POST /api/doctor/complete-appointment
#[utoipa::path(
    post,
    path = "/api/doctor/complete-appointment",
    request_body = AppointmentIdRequest,
    responses(
        (status = 200, description = "Appointment completed", body = Success<MessageBody>),
        (status = 400, description = "Appointment was cancelled"),
        (status = 403, description = "Appointment belongs to another doctor")
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn complete_appointment_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
    Body(req): Body<AppointmentIdRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    state.booking.complete(doctor_id, req.appointment_id).await?;
    Ok(message("Appointment Completed"))
}

/// POST /api/doctor/cancel-appointment
#[utoipa::path(
    post,
    path = "/api/doctor/cancel-appointment",
    request_body = AppointmentIdRequest,
    responses(
        (status = 200, description = "Appointment cancelled", body = Success<MessageBody>),
        (status = 400, description = "Appointment was already completed"),
        (status = 403, description = "Appointment belongs to another doctor")
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn doctor_cancel_appointment_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
    Body(req): Body<AppointmentIdRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    state
        .booking
        .cancel_as_doctor(doctor_id, req.appointment_id)
        .await?;
    Ok(message("Appointment Cancelled"))
}

/// GET /api/doctor/dashboard
#[utoipa::path(
    get,
    path = "/api/doctor/dashboard",
    responses(
        (
            status = 200,
            description = "Earnings and recent bookings",
            body = Success<DoctorDashboardResponse>
        )
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn doctor_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
) -> HandlerResult<Json<Success<DoctorDashboardResponse>>> {
    let dashboard = state.booking.doctor_dashboard(doctor_id).await?;
    Ok(ok(DoctorDashboardResponse {
        dash_data: dashboard.into(),
    }))
}

/// GET /api/doctor/profile
#[utoipa::path(
    get,
    path = "/api/doctor/profile",
    responses(
        (
            status = 200,
            description = "The doctor's own profile",
            body = Success<DoctorProfileResponse>
        )
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn doctor_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
) -> HandlerResult<Json<Success<DoctorProfileResponse>>> {
    let doctor = state.db.get_doctor(doctor_id).await?;
    Ok(ok(DoctorProfileResponse {
        profile_data: doctor.into(),
    }))
}

/// POST /api/doctor/update-profile - Fee, address and availability
#[utoipa::path(
    post,
    path = "/api/doctor/update-profile",
    request_body = UpdateDoctorProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Success<MessageBody>),
        (status = 400, description = "Negative fee")
    ),
    params(("dtoken" = String, Header, description = "Doctor session token"))
)]
pub async fn update_doctor_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(DoctorId(doctor_id)): Extension<DoctorId>,
    Body(req): Body<UpdateDoctorProfileRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    if req.fees < 0 {
        return Err(HttpError::bad_request("Fees cannot be negative"));
    }
    state
        .db
        .update_doctor_profile(
            doctor_id,
            DoctorProfileUpdate {
                fees: req.fees,
                address: req.address.into(),
                available: req.available,
            },
        )
        .await?;
    Ok(message("Profile Updated"))
}
