use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::inventory::{Address, BedType, Doctor, Timings, Ward};

// ==============================================================================
// ADMIN REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddHospitalRequest {
    pub name: String,
    pub contact_number: String,
    pub address: Address,
    pub total_beds: u32,
    #[serde(default)]
    pub emergency_services: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardBeds {
    pub ward: Ward,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitBedsRequest {
    pub wards: Vec<WardBeds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBedTypeRequest {
    pub bed_type: BedType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDoctorRequest {
    pub name: String,
    pub specialty: String,
    pub contact_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateDoctorRequest {
    pub doctor_id: Uuid,
    pub timings: Timings,
    pub max_appointment: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAffiliationRequest {
    pub timings: Timings,
    pub max_appointment: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClinicRequest {
    pub clinic_name: String,
    pub address: Address,
    pub timings: Timings,
    pub max_appointment: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClinicTimingsRequest {
    pub timings: Timings,
}

// ==============================================================================
// QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HospitalQuery {
    pub city: Option<String>,
    pub emergency: Option<bool>,
    pub last_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClinicQuery {
    pub city: String,
    pub last_id: Option<Uuid>,
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

/// Cursor page. `next_cursor` is the `last_id` for the next request, if there may be more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Uuid>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, limit: usize, cursor: impl Fn(&T) -> Uuid) -> Self {
        let next_cursor = if items.len() == limit {
            items.last().map(|item| cursor(item))
        } else {
            None
        };
        Self { items, next_cursor }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalListing {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    pub contact_number: String,
    pub beds_available: u32,
    pub emergency_services: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableBed {
    pub id: Uuid,
    pub ward: Ward,
    pub bed_number: String,
    pub bed_type: BedType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliatedDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub contact_number: String,
    pub timings: Timings,
    pub max_appointment: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub contact_number: String,
    pub clinic_name: String,
    pub address: Address,
    pub timings: Timings,
    pub remaining: u32,
}

impl ClinicDoctor {
    pub fn from_doctor(doctor: &Doctor) -> Option<Self> {
        let clinic = doctor.private_clinic.as_ref()?;
        Some(Self {
            id: doctor.id,
            name: doctor.name.clone(),
            specialty: doctor.specialty.clone(),
            contact_number: doctor.contact_number.clone(),
            clinic_name: clinic.clinic_name.clone(),
            address: clinic.address.clone(),
            timings: clinic.slot.timings,
            remaining: clinic.slot.remaining(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCandidate {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No beds available")]
    NoBedsAvailable,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        let message = err.to_string();
        match err {
            InventoryError::NotFound(_) => AppError::NotFound(message),
            InventoryError::Conflict(_) => AppError::Conflict(message),
            InventoryError::Validation(_) => AppError::ValidationError(message),
            InventoryError::NoBedsAvailable => AppError::BadRequest(message),
            InventoryError::Store(_) => AppError::Database(message),
        }
    }
}
