use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{BookSlotRequest, DateRange, DateRangeQuery};
use crate::services::booking::BookingCoordinator;
use crate::services::query::AppointmentQueryService;
use crate::state::AppointmentState;

// ==============================================================================
// SLOT TRANSITION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date, slot_id)): Path<(Uuid, NaiveDate, String)>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let coordinator = BookingCoordinator::new(&state.scheduling);

    let appointment = coordinator
        .book(doctor_id, date, &slot_id, request.patient_id)
        .await?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Slot booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_slot(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date, slot_id)): Path<(Uuid, NaiveDate, String)>,
) -> Result<Json<Value>, AppError> {
    let coordinator = BookingCoordinator::new(&state.scheduling);

    let outcome = coordinator.cancel_slot(doctor_id, date, &slot_id).await?;

    Ok(Json(json!({
        "slot": outcome.slot,
        "changed": outcome.changed,
    })))
}

#[axum::debug_handler]
pub async fn complete_slot(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date, slot_id)): Path<(Uuid, NaiveDate, String)>,
) -> Result<Json<Value>, AppError> {
    let coordinator = BookingCoordinator::new(&state.scheduling);

    let slot = coordinator
        .complete_slot(doctor_id, date, &slot_id, Utc::now())
        .await?;

    Ok(Json(json!({ "slot": slot })))
}

#[axum::debug_handler]
pub async fn cancel_all_slots(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let coordinator = BookingCoordinator::new(&state.scheduling);

    let outcome = coordinator.cancel_all_slots(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "cancelled": outcome.cancelled,
        "cancelled_slot_ids": outcome.cancelled_slot_ids,
        "skipped": outcome.skipped,
    })))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_sheet(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let query_service = AppointmentQueryService::new(&state);

    let slots = query_service.slots_on_date_with_patients(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "total_slots": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let query_service = AppointmentQueryService::new(&state);
    let range = DateRange::try_from(query)?;

    let appointments = query_service.appointments_for_doctor(doctor_id, range).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from": range.from,
        "to": range.to,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let query_service = AppointmentQueryService::new(&state);
    let range = DateRange::try_from(query)?;

    let appointments = query_service.appointments_for_patient(patient_id, range).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "from": range.from,
        "to": range.to,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let query_service = AppointmentQueryService::new(&state);

    // "Today" is the clinic's local date.
    let offset = state.scheduling.config.clinic_offset();
    let today = Utc::now().with_timezone(&offset).date_naive();

    let appointments = query_service.upcoming_for_patient(patient_id, today).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "from": today,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}
