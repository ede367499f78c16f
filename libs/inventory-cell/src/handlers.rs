use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{
    AddDoctorRequest, AddHospitalRequest, AffiliateDoctorRequest, ClinicQuery, HospitalQuery,
    InitBedsRequest, SetClinicRequest, UpdateAffiliationRequest, UpdateBedTypeRequest,
    UpdateClinicTimingsRequest,
};
use crate::services::bed::BedService;
use crate::services::doctor::DoctorService;
use crate::services::hospital::HospitalService;

fn hospitals(state: &AppState) -> HospitalService {
    HospitalService::new(state.store.clone(), state.config.page_size)
}

fn doctors(state: &AppState) -> DoctorService {
    DoctorService::new(state.store.clone(), state.config.page_size)
}

// ==============================================================================
// PUBLIC LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_hospitals(
    State(state): State<AppState>,
    Query(query): Query<HospitalQuery>,
) -> Result<Json<Value>, AppError> {
    let page = hospitals(&state).list_hospitals(query).await?;

    Ok(Json(json!({
        "hospitals": page.items,
        "next_cursor": page.next_cursor
    })))
}

#[axum::debug_handler]
pub async fn available_beds(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let beds = BedService::new(state.store.clone())
        .available_beds(hospital_id)
        .await?;

    Ok(Json(json!({
        "beds": beds,
        "total": beds.len()
    })))
}

#[axum::debug_handler]
pub async fn hospital_doctors(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctors = hospitals(&state).hospital_doctors(hospital_id).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(state): State<AppState>,
    Query(query): Query<ClinicQuery>,
) -> Result<Json<Value>, AppError> {
    let page = doctors(&state).list_clinic_doctors(query).await?;

    Ok(Json(json!({
        "doctors": page.items,
        "next_cursor": page.next_cursor
    })))
}

// ==============================================================================
// ADMIN: HOSPITALS AND BEDS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_hospital(
    State(state): State<AppState>,
    Json(request): Json<AddHospitalRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let hospital = hospitals(&state).add_hospital(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "hospital": hospital,
            "message": "Hospital added successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn init_beds(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
    Json(request): Json<InitBedsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let beds = BedService::new(state.store.clone())
        .init_beds(hospital_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "beds": beds,
            "total": beds.len(),
            "message": "Beds added successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_bed_type(
    State(state): State<AppState>,
    Path(bed_id): Path<Uuid>,
    Json(request): Json<UpdateBedTypeRequest>,
) -> Result<Json<Value>, AppError> {
    let bed = BedService::new(state.store.clone())
        .update_bed_type(bed_id, request.bed_type)
        .await?;

    Ok(Json(json!({ "bed": bed })))
}

#[axum::debug_handler]
pub async fn unaffiliated_doctors(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctors = hospitals(&state).unaffiliated_doctors(hospital_id).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

// ==============================================================================
// ADMIN: DOCTORS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<AppState>,
    Json(request): Json<AddDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = doctors(&state).add_doctor(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "doctor": doctor,
            "message": "Doctor added successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn affiliate_doctor(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
    Json(request): Json<AffiliateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = doctors(&state).affiliate_doctor(hospital_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!({ "doctor": doctor }))))
}

#[axum::debug_handler]
pub async fn update_affiliation(
    State(state): State<AppState>,
    Path((hospital_id, doctor_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAffiliationRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = doctors(&state)
        .update_affiliation(hospital_id, doctor_id, request)
        .await?;

    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn set_private_clinic(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<SetClinicRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = doctors(&state).set_private_clinic(doctor_id, request).await?;

    Ok(Json(json!({ "doctor": doctor })))
}

#[axum::debug_handler]
pub async fn update_clinic_timings(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateClinicTimingsRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = doctors(&state)
        .update_clinic_timings(doctor_id, request.timings)
        .await?;

    Ok(Json(json!({ "doctor": doctor })))
}
