// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentId, AppointmentRequest, BookSlotRequest, NextAvailableQuery,
    ScheduleAppointmentRequest, SlotTime,
};
use crate::services::booking::BookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub time: SlotTime,
}

fn to_app_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        e @ AppointmentError::SlotNotFound { .. } => AppError::NotFound(e.to_string()),
        e @ (AppointmentError::SlotNotAvailable { .. } | AppointmentError::ConflictDetected) => {
            AppError::Conflict(e.to_string())
        }
        e @ AppointmentError::InvalidStatusTransition(_) => AppError::BadRequest(e.to_string()),
        AppointmentError::InvalidTime(msg) => AppError::ValidationError(format!("Invalid time: {}", msg)),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SLOT TABLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn populate_slots(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
) -> Result<Json<Value>, AppError> {
    let created = service.slots.populate_day(day).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "day": day,
        "created": created,
    })))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
) -> Result<Json<Value>, AppError> {
    let slots = service.slots.slots_for_day(day).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "day": day,
        "slots": slots,
        "total": slots.len(),
    })))
}

/// Books a slot. A taken slot answers 409 with the open neighbours.
#[axum::debug_handler]
pub async fn book_slot(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
    Json(request): Json<BookSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match service
        .slots
        .book_slot(day, request.time, &request.name, &request.contact)
        .await
    {
        Ok(booking_number) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "booked": true,
                "booking_number": booking_number,
                "day": day,
                "time": request.time,
            })),
        )),
        Err(AppointmentError::SlotNotAvailable { day, time, nearby }) => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "booked": false,
                "error": format!("Slot on {} at {} is already booked", day, time),
                "nearby": nearby,
            })),
        )),
        Err(e) => Err(to_app_error(e)),
    }
}

#[axum::debug_handler]
pub async fn nearby_slots(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Value>, AppError> {
    let nearby = service
        .slots
        .find_nearby_available(day, query.time)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "day": day,
        "time": query.time,
        "nearby": nearby,
    })))
}

#[axum::debug_handler]
pub async fn list_bookings(
    State(service): State<Arc<BookingService>>,
) -> Result<Json<Value>, AppError> {
    let bookings = service.slots.booked_slots().await.map_err(to_app_error)?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len(),
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn next_available(
    State(service): State<Arc<BookingService>>,
    Query(query): Query<NextAvailableQuery>,
) -> Result<Json<Value>, AppError> {
    let slot = service
        .availability
        .next_available_slot(query.preferred_start, query.urgency)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "preferred_start": query.preferred_start,
        "next_available": slot,
    })))
}

#[axum::debug_handler]
pub async fn available_moments(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
) -> Result<Json<Value>, AppError> {
    let moments = service
        .availability
        .available_moments(day)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "day": day,
        "available": moments,
    })))
}

#[axum::debug_handler]
pub async fn schedule_appointment(
    State(service): State<Arc<BookingService>>,
    Json(request): Json<ScheduleAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = service
        .ledger
        .schedule_appointment(request)
        .await
        .map_err(to_app_error)?
        .ok_or_else(|| to_app_error(AppointmentError::ConflictDetected))?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn appointments_for_day(
    State(service): State<Arc<BookingService>>,
    Path(day): Path<NaiveDate>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .ledger
        .appointments_for_day(day)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "day": day,
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<BookingService>>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .ledger
        .appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<BookingService>>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let found = service
        .ledger
        .cancel_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;
    if !found {
        return Err(to_app_error(AppointmentError::NotFound));
    }

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": "cancelled",
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(service): State<Arc<BookingService>>,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let found = service
        .ledger
        .complete_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;
    if !found {
        return Err(to_app_error(AppointmentError::NotFound));
    }

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": "completed",
    })))
}

#[axum::debug_handler]
pub async fn schedule_batch(
    State(service): State<Arc<BookingService>>,
    Json(requests): Json<Vec<AppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let outcomes = service
        .schedule_batch(requests)
        .await
        .map_err(to_app_error)?;
    let scheduled = outcomes.iter().filter(|o| o.appointment.is_some()).count();

    Ok(Json(json!({
        "outcomes": outcomes,
        "scheduled": scheduled,
        "unscheduled": outcomes.len() - scheduled,
    })))
}
