use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::SchedulingState;

pub fn availability_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_available_dates))
        .route(
            "/{doctor_id}/availability/{date}",
            post(handlers::mark_availability).delete(handlers::withdraw_availability),
        )
        .route("/{doctor_id}/availability/{date}/slots", get(handlers::get_slots))
        .with_state(state)
}
