//! Storage seam of the booking core.
//!
//! Reads and single-document admin writes go through [`InventoryStore`] and
//! [`BookingRecordStore`]. Everything that reserves or releases a resource runs
//! inside a [`StoreTransaction`] whose primitives are guarded updates: each one
//! reports whether its predicate matched instead of reading and writing back.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::booking::{Booking, BookingFilter, BookingStatus, UserBookings};
use shared_models::inventory::{
    Affiliation, Bed, BedStatus, BedType, Doctor, Hospital, PrivateClinic, SlotKey, Timings,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response from storage: {0}")]
    UnexpectedResponse(String),

    #[error("Transaction already committed or rolled back")]
    TransactionClosed,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Cursor page: items with id strictly greater than `after`, ascending by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<Uuid>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HospitalFilter {
    pub city: Option<String>,
    pub emergency_services: Option<bool>,
    pub with_available_beds: bool,
}

impl HospitalFilter {
    pub fn matches(&self, hospital: &Hospital) -> bool {
        self.city.as_ref().map_or(true, |c| &hospital.address.city == c)
            && self
                .emergency_services
                .map_or(true, |e| hospital.emergency_services == e)
            && (!self.with_available_beds || hospital.beds_available > 0)
    }
}

/// Outcome of the capacity-guarded append on a slot-holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPush {
    Pushed,
    Full,
    MissingSlot,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_hospital(&self, hospital_id: Uuid) -> StoreResult<Option<Hospital>>;

    async fn find_hospital_by_contact(&self, contact_number: &str) -> StoreResult<Option<Hospital>>;

    async fn list_hospitals(
        &self,
        filter: &HospitalFilter,
        page: PageRequest,
    ) -> StoreResult<Vec<Hospital>>;

    async fn insert_hospital(&self, hospital: &Hospital) -> StoreResult<()>;

    /// Adds `doctor_id` to the hospital's doctor list. `false` if the hospital is missing.
    async fn link_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> StoreResult<bool>;

    async fn get_bed(&self, bed_id: Uuid) -> StoreResult<Option<Bed>>;

    async fn list_beds(&self, hospital_id: Uuid, status: Option<BedStatus>) -> StoreResult<Vec<Bed>>;

    async fn insert_beds(&self, beds: &[Bed]) -> StoreResult<()>;

    async fn update_bed_type(&self, bed_id: Uuid, bed_type: BedType) -> StoreResult<Option<Bed>>;

    async fn get_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>>;

    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> StoreResult<Vec<Doctor>>;

    async fn find_doctor_by_contact(&self, contact_number: &str) -> StoreResult<Option<Doctor>>;

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>>;

    /// Doctors whose private clinic is in `city`, paged by doctor id.
    async fn list_clinic_doctors(&self, city: &str, page: PageRequest) -> StoreResult<Vec<Doctor>>;

    async fn insert_doctor(&self, doctor: &Doctor) -> StoreResult<()>;

    /// `false` if the doctor is missing or already affiliated with that hospital.
    async fn add_affiliation(&self, doctor_id: Uuid, affiliation: &Affiliation) -> StoreResult<bool>;

    /// Guard: the affiliation exists and `max_appointment` is not below the held count.
    async fn update_affiliation(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        timings: Timings,
        max_appointment: u32,
    ) -> StoreResult<bool>;

    /// Guard: the doctor exists and has no clinic yet.
    async fn set_private_clinic(&self, doctor_id: Uuid, clinic: &PrivateClinic) -> StoreResult<bool>;

    /// Guard: the doctor has a clinic.
    async fn update_clinic_timings(&self, doctor_id: Uuid, timings: Timings) -> StoreResult<bool>;
}

#[async_trait]
pub trait BookingRecordStore: Send + Sync {
    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    async fn get_bookings(&self, booking_ids: &[Uuid]) -> StoreResult<Vec<Booking>>;

    async fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;

    async fn get_user_bookings(&self, user_id: Uuid) -> StoreResult<Option<UserBookings>>;

    /// The user whose history holds `booking_id`.
    async fn find_booking_owner(&self, booking_id: Uuid) -> StoreResult<Option<Uuid>>;
}

#[async_trait]
pub trait TransactionalStore: InventoryStore + BookingRecordStore {
    /// Whether a transaction commits all-or-nothing on its own. Non-atomic
    /// backends compensate on rollback instead.
    fn is_atomic(&self) -> bool;

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Standalone guarded write: frees the bed only while `booking_id` still holds it.
    async fn release_bed_hold(&self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool>;
}

/// One atomic unit of booking work. Dropping it without `commit` discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Guard: bed id + hospital id + status Available.
    async fn occupy_bed(&mut self, hospital_id: Uuid, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool>;

    /// Guard: status Occupied and held by `booking_id`.
    async fn release_bed(&mut self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool>;

    /// Compare-and-swap on `beds_available`; the result must stay in `0..=total_beds`.
    async fn adjust_beds_available(&mut self, hospital_id: Uuid, delta: i32) -> StoreResult<bool>;

    /// Appends `booking_id` only while the slot-holder is below capacity.
    async fn push_appointment(
        &mut self,
        doctor_id: Uuid,
        slot: SlotKey,
        booking_id: Uuid,
    ) -> StoreResult<SlotPush>;

    /// Guard: the slot-holder currently holds `booking_id`.
    async fn pull_appointment(&mut self, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<bool>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    /// Guard: the booking is currently in status `from`.
    async fn update_booking_status(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<bool>;

    /// Appends to the user's history, creating the history on first use.
    async fn append_user_booking(&mut self, user_id: Uuid, role: Role, booking_id: Uuid) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;
}
