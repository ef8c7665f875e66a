use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use availability_cell::router::availability_routes;
use availability_cell::SchedulingState;
use shared_config::AppConfig;

pub fn create_router(config: AppConfig) -> Router {
    let scheduling = Arc::new(SchedulingState::from_config(config));
    let appointments = Arc::new(AppointmentState::from_scheduling(Arc::clone(&scheduling)));

    Router::new()
        .route("/", get(|| async { "Amae scheduling API is running!" }))
        .nest("/doctors", availability_routes(scheduling))
        .nest("/appointments", appointment_routes(appointments))
}
