use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    Router::new()
        // Slot transitions
        .route("/doctors/{doctor_id}/dates/{date}/slots/{slot_id}/book", post(handlers::book_slot))
        .route("/doctors/{doctor_id}/dates/{date}/slots/{slot_id}/cancel", post(handlers::cancel_slot))
        .route("/doctors/{doctor_id}/dates/{date}/slots/{slot_id}/complete", post(handlers::complete_slot))
        .route("/doctors/{doctor_id}/dates/{date}/cancel-all", post(handlers::cancel_all_slots))

        // Listings
        .route("/doctors/{doctor_id}/dates/{date}/slots", get(handlers::get_day_sheet))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/patients/{patient_id}/upcoming", get(handlers::get_upcoming_appointments))
        .with_state(state)
}
