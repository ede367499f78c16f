use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CancelBookingRequest, ReserveAppointmentRequest, ReserveBedRequest};
use crate::services::engine::BookingEngine;
use crate::services::query::BookingQueryService;

// ==============================================================================
// RESERVATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn reserve_bed(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveBedRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = user.identity()?;
    let engine = BookingEngine::new(state.store.clone());

    let booking = engine.reserve_bed(&identity, request).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Bed booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = user.identity()?;
    let engine = BookingEngine::new(state.store.clone());

    let booking = engine.reserve_appointment(&identity, request).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Appointment booked successfully"
    })))
}

/// Shared by the user and admin routes; ownership is checked by the engine.
#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = user.identity()?;
    let engine = BookingEngine::new(state.store.clone());

    let booking = engine.cancel_booking(&identity, request.booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking cancelled successfully"
    })))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_user_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let identity = user.identity()?;
    let query = BookingQueryService::new(state.store.clone());

    let bookings = query.list_user_bookings(&identity).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let identity = user.identity()?;
    let query = BookingQueryService::new(state.store.clone());

    let booking = query.get_booking(&identity, booking_id).await?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn bed_bookings(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let query = BookingQueryService::new(state.store.clone());
    let bookings = query.bed_bookings(hospital_id).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn doctor_bookings(
    State(state): State<AppState>,
    Path((hospital_id, doctor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let query = BookingQueryService::new(state.store.clone());
    let bookings = query.doctor_bookings(hospital_id, doctor_id).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn clinic_bookings(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let query = BookingQueryService::new(state.store.clone());
    let bookings = query.clinic_bookings(doctor_id).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}
