use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::inventory::SlotKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Visited,
}

impl BookingStatus {
    pub fn can_transition_to(&self, next: &BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Visited)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Visited => "visited",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    BedBooking,
    DoctorAppointment,
    ClinicAppointment,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::BedBooking => "bed_booking",
            BookingType::DoctorAppointment => "doctor_appointment",
            BookingType::ClinicAppointment => "clinic_appointment",
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reserved resource. Fixed when the booking is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "booking_type", rename_all = "snake_case")]
pub enum BookingTarget {
    BedBooking {
        hospital_id: Uuid,
        bed_id: Uuid,
        check_in_date: DateTime<Utc>,
        #[serde(default)]
        check_out_date: Option<DateTime<Utc>>,
    },
    DoctorAppointment {
        doctor_id: Uuid,
        hospital_id: Uuid,
        appointment_date: DateTime<Utc>,
    },
    ClinicAppointment {
        doctor_id: Uuid,
        appointment_date: DateTime<Utc>,
    },
}

impl BookingTarget {
    pub fn booking_type(&self) -> BookingType {
        match self {
            BookingTarget::BedBooking { .. } => BookingType::BedBooking,
            BookingTarget::DoctorAppointment { .. } => BookingType::DoctorAppointment,
            BookingTarget::ClinicAppointment { .. } => BookingType::ClinicAppointment,
        }
    }

    pub fn hospital_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::BedBooking { hospital_id, .. }
            | BookingTarget::DoctorAppointment { hospital_id, .. } => Some(*hospital_id),
            BookingTarget::ClinicAppointment { .. } => None,
        }
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::DoctorAppointment { doctor_id, .. }
            | BookingTarget::ClinicAppointment { doctor_id, .. } => Some(*doctor_id),
            BookingTarget::BedBooking { .. } => None,
        }
    }

    pub fn bed_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::BedBooking { bed_id, .. } => Some(*bed_id),
            _ => None,
        }
    }

    /// Slot-holder consumed by an appointment booking.
    pub fn slot_key(&self) -> Option<SlotKey> {
        match self {
            BookingTarget::DoctorAppointment { hospital_id, .. } => Some(SlotKey::Hospital(*hospital_id)),
            BookingTarget::ClinicAppointment { .. } => Some(SlotKey::Clinic),
            BookingTarget::BedBooking { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub patient_name: String,
    pub patient_contact: String,
    #[serde(flatten)]
    pub target: BookingTarget,
    #[serde(default)]
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(patient_name: String, patient_contact: String, target: BookingTarget) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_name,
            patient_contact,
            target,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn booking_type(&self) -> BookingType {
        self.target.booking_type()
    }

    /// Move to `next`, returning the rejected pair when the lifecycle forbids it.
    pub fn transition(&mut self, next: BookingStatus) -> Result<(), (BookingStatus, BookingStatus)> {
        if !self.status.can_transition_to(&next) {
            return Err((self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Ordered booking history of one user. Entries are never pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBookings {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub bookings: Vec<Uuid>,
}

impl UserBookings {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            bookings: Vec::new(),
        }
    }

    pub fn holds(&self, booking_id: Uuid) -> bool {
        self.bookings.contains(&booking_id)
    }
}

/// Equality filter over booking records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub booking_type: Option<BookingType>,
    pub status: Option<BookingStatus>,
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.booking_type.map_or(true, |t| booking.booking_type() == t)
            && self.status.map_or(true, |s| booking.status == s)
            && self.hospital_id.map_or(true, |h| booking.target.hospital_id() == Some(h))
            && self.doctor_id.map_or(true, |d| booking.target.doctor_id() == Some(d))
    }
}
