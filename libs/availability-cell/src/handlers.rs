use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::MarkAvailabilityRequest;
use crate::services::availability::AvailabilityService;
use crate::state::SchedulingState;

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn mark_availability(
    State(state): State<Arc<SchedulingState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
    Json(request): Json<MarkAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let availability = if request.uses_directory() {
        availability_service
            .mark_available_from_directory(doctor_id, date, request.slot_duration_minutes)
            .await?
    } else {
        let windows = request.windows()?;
        let duration = request
            .slot_duration_minutes
            .unwrap_or(state.config.default_slot_duration_minutes);
        availability_service.mark_available(doctor_id, date, &windows, duration).await?
    };

    Ok(Json(json!({
        "availability": availability,
        "counts": availability.counts(),
    })))
}

#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<Arc<SchedulingState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let dates = availability_service.get_available_dates(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "total": dates.len(),
        "dates": dates,
    })))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<SchedulingState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let slots = availability_service.get_slots(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "total_slots": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn withdraw_availability(
    State(state): State<Arc<SchedulingState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let removed = availability_service.withdraw_availability(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "removed": removed,
    })))
}
