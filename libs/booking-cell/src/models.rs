use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::booking::Booking;
use shared_models::error::AppError;
use shared_models::inventory::{Address, BedType, Timings, Ward};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveBedRequest {
    pub hospital_id: Uuid,
    pub bed_id: Uuid,
    pub patient_name: String,
    pub patient_contact: String,
    pub check_in_date: DateTime<Utc>,
    #[serde(default)]
    pub check_out_date: Option<DateTime<Utc>>,
}

/// Without `hospital_id` the appointment is booked at the doctor's private clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveAppointmentRequest {
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub patient_name: String,
    pub patient_contact: String,
    pub appointment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalSummary {
    pub id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub contact_number: String,
    /// Timings of the slot-holder the booking was made against.
    pub timings: Option<Timings>,
    pub clinic_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedSummary {
    pub id: Uuid,
    pub ward: Ward,
    pub bed_number: String,
    pub bed_type: BedType,
}

/// A booking joined with summaries of the resources it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub hospital: Option<HospitalSummary>,
    pub doctor: Option<DoctorSummary>,
    pub bed: Option<BedSummary>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Requested resource is no longer available")]
    ResourceUnavailable,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not affiliated with this hospital")]
    AffiliationNotFound,

    #[error("Doctor has no private clinic")]
    ClinicNotFound,

    #[error("No appointment slots left")]
    CapacityExceeded,

    #[error("Not allowed to access this booking")]
    AccessForbidden,

    #[error("Invalid booking id")]
    InvalidBookingId,

    #[error("Booking cannot be changed: {0}")]
    InvalidState(String),

    #[error("Booking transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::NotFound(_)
            | BookingError::DoctorNotFound
            | BookingError::AffiliationNotFound
            | BookingError::ClinicNotFound
            | BookingError::InvalidBookingId => AppError::NotFound(message),
            BookingError::ResourceUnavailable
            | BookingError::CapacityExceeded
            | BookingError::InvalidState(_) => AppError::BadRequest(message),
            BookingError::AccessForbidden => AppError::Forbidden(message),
            BookingError::TransactionFailed(_) => AppError::Internal(message),
            BookingError::Store(_) => AppError::Database(message),
        }
    }
}
