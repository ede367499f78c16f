use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// HOSPITALS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    // Filled by the geocoding collaborator, never by this service.
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    pub contact_number: String,
    pub total_beds: u32,
    pub beds_available: u32,
    #[serde(default)]
    pub doctors: Vec<Uuid>,
    #[serde(default)]
    pub emergency_services: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hospital {
    /// A new hospital starts with every bed available.
    pub fn new(
        name: String,
        address: Address,
        contact_number: String,
        total_beds: u32,
        emergency_services: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            address,
            contact_number,
            total_beds,
            beds_available: total_beds,
            doctors: Vec::new(),
            emergency_services,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counter after applying `delta`, or `None` if it would leave `0..=total_beds`.
    pub fn adjusted_beds_available(&self, delta: i32) -> Option<u32> {
        let next = i64::from(self.beds_available) + i64::from(delta);
        if next < 0 || next > i64::from(self.total_beds) {
            None
        } else {
            Some(next as u32)
        }
    }
}

// ==============================================================================
// BEDS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ward {
    Icu,
    General,
    Pediatrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedType {
    #[default]
    General,
    Icu,
    Ventilator,
    Private,
    SemiPrivate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    #[default]
    Available,
    Occupied,
    UnderMaintenance,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "available",
            BedStatus::Occupied => "occupied",
            BedStatus::UnderMaintenance => "under_maintenance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub ward: Ward,
    pub bed_number: String,
    #[serde(default)]
    pub bed_type: BedType,
    #[serde(default)]
    pub status: BedStatus,
    pub booking_id: Option<Uuid>,
}

impl Bed {
    pub fn new(hospital_id: Uuid, ward: Ward, bed_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            hospital_id,
            ward,
            bed_number,
            bed_type: BedType::General,
            status: BedStatus::Available,
            booking_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == BedStatus::Available
    }

    /// `Occupied` exactly when a booking holds the bed.
    pub fn is_consistent(&self) -> bool {
        (self.status == BedStatus::Occupied) == self.booking_id.is_some()
    }
}

// ==============================================================================
// DOCTORS AND SLOT-HOLDERS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Capacity-bounded appointment list shared by affiliations and clinics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub timings: Timings,
    pub max_appointment: u32,
    #[serde(default)]
    pub appointments: Vec<Uuid>,
}

impl AppointmentSlot {
    pub fn new(timings: Timings, max_appointment: u32) -> Self {
        Self {
            timings,
            max_appointment,
            appointments: Vec::new(),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.appointments.len() < self.max_appointment as usize
    }

    pub fn remaining(&self) -> u32 {
        self.max_appointment
            .saturating_sub(self.appointments.len() as u32)
    }

    pub fn holds(&self, booking_id: Uuid) -> bool {
        self.appointments.contains(&booking_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub hospital_id: Uuid,
    #[serde(flatten)]
    pub slot: AppointmentSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateClinic {
    pub clinic_name: String,
    pub address: Address,
    #[serde(flatten)]
    pub slot: AppointmentSlot,
}

/// Addresses one slot-holder of a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "hospital_id", rename_all = "snake_case")]
pub enum SlotKey {
    Hospital(Uuid),
    Clinic,
}

impl SlotKey {
    pub fn hospital_id(&self) -> Option<Uuid> {
        match self {
            SlotKey::Hospital(id) => Some(*id),
            SlotKey::Clinic => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub contact_number: String,
    #[serde(default)]
    pub affiliations: Vec<Affiliation>,
    pub private_clinic: Option<PrivateClinic>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn new(name: String, specialty: String, contact_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            specialty,
            contact_number,
            affiliations: Vec::new(),
            private_clinic: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn affiliation(&self, hospital_id: Uuid) -> Option<&Affiliation> {
        self.affiliations.iter().find(|a| a.hospital_id == hospital_id)
    }

    pub fn is_affiliated_with(&self, hospital_id: Uuid) -> bool {
        self.affiliation(hospital_id).is_some()
    }

    pub fn slot(&self, key: SlotKey) -> Option<&AppointmentSlot> {
        match key {
            SlotKey::Hospital(hospital_id) => self.affiliation(hospital_id).map(|a| &a.slot),
            SlotKey::Clinic => self.private_clinic.as_ref().map(|c| &c.slot),
        }
    }

    pub fn slot_mut(&mut self, key: SlotKey) -> Option<&mut AppointmentSlot> {
        match key {
            SlotKey::Hospital(hospital_id) => self
                .affiliations
                .iter_mut()
                .find(|a| a.hospital_id == hospital_id)
                .map(|a| &mut a.slot),
            SlotKey::Clinic => self.private_clinic.as_mut().map(|c| &mut c.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> Timings {
        Timings {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        }
    }

    fn address() -> Address {
        Address {
            street: "7 Ekbalpur Lane".to_string(),
            city: "Kolkata".to_string(),
            state: "West Bengal".to_string(),
            zip_code: "700023".to_string(),
            lat: None,
            lng: None,
        }
    }

    #[test]
    fn bed_counter_stays_within_total() {
        let mut hospital = Hospital::new("General".into(), address(), "1234567890".into(), 2, false);
        assert_eq!(hospital.adjusted_beds_available(1), None);
        assert_eq!(hospital.adjusted_beds_available(-1), Some(1));

        hospital.beds_available = 0;
        assert_eq!(hospital.adjusted_beds_available(-1), None);
        assert_eq!(hospital.adjusted_beds_available(1), Some(1));
    }

    #[test]
    fn slot_lookup_by_key() {
        let hospital_id = Uuid::new_v4();
        let mut doctor = Doctor::new("Dr. Jane Doe".into(), "Cardiology".into(), "1234567899".into());
        doctor.affiliations.push(Affiliation {
            hospital_id,
            slot: AppointmentSlot::new(timings(), 5),
        });

        assert!(doctor.slot(SlotKey::Hospital(hospital_id)).is_some());
        assert!(doctor.slot(SlotKey::Hospital(Uuid::new_v4())).is_none());
        assert!(doctor.slot(SlotKey::Clinic).is_none());

        let booking_id = Uuid::new_v4();
        doctor
            .slot_mut(SlotKey::Hospital(hospital_id))
            .unwrap()
            .appointments
            .push(booking_id);
        let slot = doctor.slot(SlotKey::Hospital(hospital_id)).unwrap();
        assert!(slot.holds(booking_id));
        assert_eq!(slot.remaining(), 4);
    }

    #[test]
    fn slot_capacity_zero_is_always_full() {
        let slot = AppointmentSlot::new(timings(), 0);
        assert!(!slot.has_capacity());
        assert_eq!(slot.remaining(), 0);
    }

    #[test]
    fn bed_consistency_tracks_booking_reference() {
        let mut bed = Bed::new(Uuid::new_v4(), Ward::General, "1".into());
        assert!(bed.is_consistent());
        bed.status = BedStatus::Occupied;
        assert!(!bed.is_consistent());
        bed.booking_id = Some(Uuid::new_v4());
        assert!(bed.is_consistent());
    }
}
