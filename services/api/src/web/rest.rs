//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. Handlers live in the
//! per-role modules next to this one.

use crate::web::{admin, articles, auth, doctor, response, user};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::user_login_handler,
        auth::doctor_login_handler,
        auth::admin_login_handler,
        auth::logout_handler,
        user::get_profile_handler,
        user::update_profile_handler,
        user::book_appointment_handler,
        user::list_appointments_handler,
        user::cancel_appointment_handler,
        user::reschedule_appointment_handler,
        user::available_slots_handler,
        user::queue_slots_handler,
        user::queue_position_handler,
        doctor::list_doctors_handler,
        doctor::doctor_appointments_handler,
        doctor::complete_appointment_handler,
        doctor::doctor_cancel_appointment_handler,
        doctor::doctor_dashboard_handler,
        doctor::doctor_profile_handler,
        doctor::update_doctor_profile_handler,
        admin::add_doctor_handler,
        admin::all_doctors_handler,
        admin::change_availability_handler,
        admin::all_appointments_handler,
        admin::admin_cancel_appointment_handler,
        admin::admin_dashboard_handler,
        admin::add_patient_handler,
        articles::list_articles_handler,
        articles::add_article_handler,
        articles::set_approval_handler,
    ),
    components(
        schemas(
            response::ErrorBody,
            response::MessageBody,
            response::UserView,
            response::DoctorView,
            response::AppointmentView,
            response::AppointmentListResponse,
            response::ArticleView,
            response::DaySlotsView,
            response::DayQueueView,
            response::BookingModeDto,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::TokenResponse,
            user::BookAppointmentRequest,
            user::RescheduleRequest,
            user::AppointmentResponse,
            admin::AddDoctorRequest,
            admin::AddPatientRequest,
            articles::AddArticleRequest,
            articles::SetApprovalRequest,
        )
    ),
    tags(
        (
            name = "Clinic Booking API",
            description = "Patient booking, doctor and admin endpoints for the clinic."
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert_eq!(paths.len(), 31);
        assert!(paths.contains_key("/api/user/book-appointment"));
        assert!(paths.contains_key("/api/articles"));
    }

    /// Follows a `$ref` into `components.schemas`, if there is one.
    fn resolve<'a>(doc: &'a Value, schema: &'a Value) -> &'a Value {
        match schema["$ref"].as_str().and_then(|r| r.rsplit('/').next()) {
            Some(name) => &doc["components"]["schemas"][name],
            None => schema,
        }
    }

    #[test]
    fn success_responses_document_the_envelope_flag() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for (path, method) in [
            ("/api/user/register", "post"),
            ("/api/user/get-profile", "get"),
            ("/api/admin/dashboard", "get"),
        ] {
            let schema =
                &doc["paths"][path][method]["responses"]["200"]["content"]["application/json"]
                    ["schema"];
            let rendered = resolve(&doc, schema).to_string();
            assert!(rendered.contains("\"success\""), "{path}: {rendered}");
        }
    }
}
