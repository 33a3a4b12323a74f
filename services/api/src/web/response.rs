//! services/api/src/web/response.rs
//!
//! The JSON shapes returned by the REST API and the error type every handler uses.
//! Successful bodies carry `"success": true`; failures carry `"success": false`
//! and a `message`, with a status code matching the failure.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clinic_core::domain::{
    Address, AdminDashboard, Appointment, Article, BookingMode, Doctor, DoctorDashboard, User,
};
use clinic_core::ports::PortError;
use clinic_core::schedule::{DayQueue, DaySlots};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Errors
//=========================================================================================

/// An error response: a status code and a message for the client.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            PortError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            PortError::Invalid(msg) => Self::bad_request(msg),
            PortError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            PortError::Unauthorized => Self::unauthorized("Not authorized, login again"),
            PortError::Unexpected(msg) => {
                error!("Unexpected service failure: {}", msg);
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type HandlerResult<T> = Result<T, HttpError>;

/// JSON request body whose rejections use the same error shape as the handlers.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(HttpError))]
pub struct Body<T>(pub T);

/// Answers unknown routes with the JSON error shape.
pub async fn not_found() -> HttpError {
    HttpError::new(StatusCode::NOT_FOUND, "Route not found")
}

//=========================================================================================
// Success Envelope
//=========================================================================================

/// Wraps a payload as `{"success": true, ...payload}`.
#[derive(Serialize, ToSchema)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

#[derive(Serialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

pub fn message(text: impl Into<String>) -> Json<Success<MessageBody>> {
    ok(MessageBody {
        message: text.into(),
    })
}

//=========================================================================================
// Shared Views
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingModeDto {
    Queue,
    Priority,
}

impl From<BookingModeDto> for BookingMode {
    fn from(mode: BookingModeDto) -> Self {
        match mode {
            BookingModeDto::Queue => BookingMode::Queue,
            BookingModeDto::Priority => BookingMode::Priority,
        }
    }
}

impl From<BookingMode> for BookingModeDto {
    fn from(mode: BookingMode) -> Self {
        match mode {
            BookingMode::Queue => BookingModeDto::Queue,
            BookingMode::Priority => BookingModeDto::Priority,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, Default)]
pub struct AddressView {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
}

impl From<Address> for AddressView {
    fn from(a: Address) -> Self {
        Self {
            line1: a.line1,
            line2: a.line2,
        }
    }
}

impl From<AddressView> for Address {
    fn from(a: AddressView) -> Self {
        Self {
            line1: a.line1,
            line2: a.line2,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: AddressView,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub image: Option<String>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            address: u.address.into(),
            gender: u.gender,
            dob: u.dob,
            image: u.image,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub available: bool,
    pub fees: i32,
    pub address: AddressView,
}

impl From<Doctor> for DoctorView {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id,
            name: d.name,
            email: d.email,
            image: d.image,
            speciality: d.speciality,
            degree: d.degree,
            experience: d.experience,
            about: d.about,
            available: d.available,
            fees: d.fees,
            address: d.address.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PatientSnapshotView {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DoctorSnapshotView {
    pub name: String,
    pub speciality: String,
    pub image: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doc_id: Uuid,
    pub user_data: PatientSnapshotView,
    pub doc_data: DoctorSnapshotView,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub slot_index: u32,
    pub amount: i32,
    pub booking_mode: BookingModeDto,
    pub queue_position: u32,
    pub token: String,
    pub appointment_type: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub payment: bool,
    pub cancelled: bool,
    pub is_completed: bool,
    pub rescheduled: bool,
    pub booked_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentView {
    fn from(a: Appointment) -> Self {
        let token = a.token().to_string();
        Self {
            id: a.id,
            user_id: a.user_id,
            doc_id: a.doctor_id,
            user_data: PatientSnapshotView {
                name: a.patient.name,
                email: a.patient.email,
                phone: a.patient.phone,
            },
            doc_data: DoctorSnapshotView {
                name: a.doctor.name,
                speciality: a.doctor.speciality,
                image: a.doctor.image,
            },
            slot_date: a.slot_date,
            slot_time: a.slot_time,
            slot_index: a.slot_index,
            amount: a.amount,
            booking_mode: a.booking_mode.into(),
            queue_position: a.queue_position,
            token,
            appointment_type: a.appointment_type.as_str().to_string(),
            description: a.description,
            attachment_url: a.attachment_url,
            payment: a.paid,
            cancelled: a.cancelled,
            is_completed: a.completed,
            rescheduled: a.rescheduled,
            booked_at: a.booked_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AppointmentListResponse {
    pub appointments: Vec<AppointmentView>,
}

pub fn appointment_views(appointments: Vec<Appointment>) -> Vec<AppointmentView> {
    appointments.into_iter().map(AppointmentView::from).collect()
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub id: Uuid,
    pub title: String,
    pub url_to_image: Option<String>,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub is_approved: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<Article> for ArticleView {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            url_to_image: a.image_url,
            source: a.source,
            url: a.url,
            published_at: a.published_at,
            is_approved: a.approved,
            kind: a.kind,
        }
    }
}

//=========================================================================================
// Schedule Views
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub index: u32,
    pub time: NaiveTime,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct DaySlotsView {
    pub date: NaiveDate,
    pub slots: Vec<SlotView>,
}

impl From<DaySlots> for DaySlotsView {
    fn from(day: DaySlots) -> Self {
        Self {
            date: day.date,
            slots: day
                .slots
                .into_iter()
                .map(|s| SlotView {
                    index: s.index,
                    time: s.start.time(),
                    start: s.start,
                    end: s.end,
                    token: s.token.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueWindowView {
    pub index: u32,
    pub time: NaiveTime,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub booked: u32,
    pub capacity: u32,
    pub available: u32,
    pub next_position: Option<u32>,
    pub next_token: Option<String>,
}

impl From<clinic_core::QueueWindow> for QueueWindowView {
    fn from(w: clinic_core::QueueWindow) -> Self {
        Self {
            index: w.index,
            time: w.start.time(),
            start: w.start,
            end: w.end,
            booked: w.booked,
            capacity: w.capacity,
            available: w.capacity.saturating_sub(w.booked),
            next_position: w.next_position,
            next_token: w.next_token.map(|t| t.to_string()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DayQueueView {
    pub date: NaiveDate,
    pub windows: Vec<QueueWindowView>,
}

impl From<DayQueue> for DayQueueView {
    fn from(day: DayQueue) -> Self {
        Self {
            date: day.date,
            windows: day.windows.into_iter().map(QueueWindowView::from).collect(),
        }
    }
}

//=========================================================================================
// Dashboards
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardView {
    pub doctors: usize,
    pub appointments: usize,
    pub patients: usize,
    pub latest_appointments: Vec<AppointmentView>,
}

impl From<AdminDashboard> for AdminDashboardView {
    fn from(d: AdminDashboard) -> Self {
        Self {
            doctors: d.doctors,
            appointments: d.appointments,
            patients: d.patients,
            latest_appointments: appointment_views(d.latest_appointments),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDashboardView {
    pub earnings: i64,
    pub appointments: usize,
    pub patients: usize,
    pub latest_appointments: Vec<AppointmentView>,
}

impl From<DoctorDashboard> for DoctorDashboardView {
    fn from(d: DoctorDashboard) -> Self {
        Self {
            earnings: d.earnings,
            appointments: d.appointments,
            patients: d.patients,
            latest_appointments: appointment_views(d.latest_appointments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_status_codes() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::Conflict("x".into()), StatusCode::CONFLICT),
            (PortError::Invalid("x".into()), StatusCode::BAD_REQUEST),
            (PortError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PortError::Unauthorized, StatusCode::UNAUTHORIZED),
            (PortError::Unexpected("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status, status);
        }
    }

    #[test]
    fn unexpected_errors_hide_their_details() {
        let err = HttpError::from(PortError::Unexpected("password authentication failed".into()));
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn success_envelope_flattens_the_payload() {
        let json = serde_json::to_value(ok(MessageBody {
            message: "Appointment Booked".to_string(),
        }).0)
        .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Appointment Booked");
    }
}
