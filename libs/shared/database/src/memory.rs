use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::booking::{Booking, BookingFilter, BookingStatus, UserBookings};
use shared_models::inventory::{
    Affiliation, Bed, BedStatus, BedType, Doctor, Hospital, PrivateClinic, SlotKey, Timings,
};

use crate::store::{
    BookingRecordStore, HospitalFilter, InventoryStore, PageRequest, SlotPush, StoreError,
    StoreResult, StoreTransaction, TransactionalStore,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    hospitals: BTreeMap<Uuid, Hospital>,
    beds: BTreeMap<Uuid, Bed>,
    doctors: BTreeMap<Uuid, Doctor>,
    bookings: HashMap<Uuid, Booking>,
    users: HashMap<Uuid, UserBookings>,
}

/// Prior value of a record touched inside a transaction.
enum Prior {
    Hospital(Uuid, Option<Hospital>),
    Bed(Uuid, Option<Bed>),
    Doctor(Uuid, Option<Doctor>),
    Booking(Uuid, Option<Booking>),
    User(Uuid, Option<UserBookings>),
}

impl MemoryState {
    fn restore(&mut self, prior: Prior) {
        match prior {
            Prior::Hospital(id, Some(v)) => {
                self.hospitals.insert(id, v);
            }
            Prior::Hospital(id, None) => {
                self.hospitals.remove(&id);
            }
            Prior::Bed(id, Some(v)) => {
                self.beds.insert(id, v);
            }
            Prior::Bed(id, None) => {
                self.beds.remove(&id);
            }
            Prior::Doctor(id, Some(v)) => {
                self.doctors.insert(id, v);
            }
            Prior::Doctor(id, None) => {
                self.doctors.remove(&id);
            }
            Prior::Booking(id, Some(v)) => {
                self.bookings.insert(id, v);
            }
            Prior::Booking(id, None) => {
                self.bookings.remove(&id);
            }
            Prior::User(id, Some(v)) => {
                self.users.insert(id, v);
            }
            Prior::User(id, None) => {
                self.users.remove(&id);
            }
        }
    }
}

/// In-process store with serializable transactions.
///
/// A transaction holds the store's writer lock for its whole lifetime and
/// journals the prior value of every record it touches, so readers never see
/// a half-applied booking and an abandoned transaction restores the journal.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(map: &BTreeMap<Uuid, T>, page: PageRequest, keep: impl Fn(&T) -> bool) -> Vec<T> {
    use std::ops::Bound::{Excluded, Unbounded};

    let lower = match page.after {
        Some(after) => Excluded(after),
        None => Unbounded,
    };
    map.range((lower, Unbounded))
        .map(|(_, v)| v)
        .filter(|v| keep(v))
        .take(page.limit)
        .cloned()
        .collect()
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_hospital(&self, hospital_id: Uuid) -> StoreResult<Option<Hospital>> {
        Ok(self.state.lock().await.hospitals.get(&hospital_id).cloned())
    }

    async fn find_hospital_by_contact(&self, contact_number: &str) -> StoreResult<Option<Hospital>> {
        let state = self.state.lock().await;
        Ok(state
            .hospitals
            .values()
            .find(|h| h.contact_number == contact_number)
            .cloned())
    }

    async fn list_hospitals(&self, filter: &HospitalFilter, page_req: PageRequest) -> StoreResult<Vec<Hospital>> {
        let state = self.state.lock().await;
        Ok(page(&state.hospitals, page_req, |h| filter.matches(h)))
    }

    async fn insert_hospital(&self, hospital: &Hospital) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .hospitals
            .insert(hospital.id, hospital.clone());
        Ok(())
    }

    async fn link_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(hospital) = state.hospitals.get_mut(&hospital_id) else {
            return Ok(false);
        };
        if !hospital.doctors.contains(&doctor_id) {
            hospital.doctors.push(doctor_id);
            hospital.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn get_bed(&self, bed_id: Uuid) -> StoreResult<Option<Bed>> {
        Ok(self.state.lock().await.beds.get(&bed_id).cloned())
    }

    async fn list_beds(&self, hospital_id: Uuid, status: Option<BedStatus>) -> StoreResult<Vec<Bed>> {
        let state = self.state.lock().await;
        Ok(state
            .beds
            .values()
            .filter(|b| b.hospital_id == hospital_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn insert_beds(&self, beds: &[Bed]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        for bed in beds {
            state.beds.insert(bed.id, bed.clone());
        }
        Ok(())
    }

    async fn update_bed_type(&self, bed_id: Uuid, bed_type: BedType) -> StoreResult<Option<Bed>> {
        let mut state = self.state.lock().await;
        Ok(state.beds.get_mut(&bed_id).map(|bed| {
            bed.bed_type = bed_type;
            bed.clone()
        }))
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        Ok(self.state.lock().await.doctors.get(&doctor_id).cloned())
    }

    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> StoreResult<Vec<Doctor>> {
        let state = self.state.lock().await;
        Ok(doctor_ids
            .iter()
            .filter_map(|id| state.doctors.get(id).cloned())
            .collect())
    }

    async fn find_doctor_by_contact(&self, contact_number: &str) -> StoreResult<Option<Doctor>> {
        let state = self.state.lock().await;
        Ok(state
            .doctors
            .values()
            .find(|d| d.contact_number == contact_number)
            .cloned())
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        Ok(self.state.lock().await.doctors.values().cloned().collect())
    }

    async fn list_clinic_doctors(&self, city: &str, page_req: PageRequest) -> StoreResult<Vec<Doctor>> {
        let state = self.state.lock().await;
        Ok(page(&state.doctors, page_req, |d| {
            d.private_clinic
                .as_ref()
                .map_or(false, |c| c.address.city == city)
        }))
    }

    async fn insert_doctor(&self, doctor: &Doctor) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .doctors
            .insert(doctor.id, doctor.clone());
        Ok(())
    }

    async fn add_affiliation(&self, doctor_id: Uuid, affiliation: &Affiliation) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(doctor) = state.doctors.get_mut(&doctor_id) else {
            return Ok(false);
        };
        if doctor.is_affiliated_with(affiliation.hospital_id) {
            return Ok(false);
        }
        doctor.affiliations.push(affiliation.clone());
        doctor.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_affiliation(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        timings: Timings,
        max_appointment: u32,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(slot) = state
            .doctors
            .get_mut(&doctor_id)
            .and_then(|d| d.slot_mut(SlotKey::Hospital(hospital_id)))
        else {
            return Ok(false);
        };
        if slot.appointments.len() > max_appointment as usize {
            return Ok(false);
        }
        slot.timings = timings;
        slot.max_appointment = max_appointment;
        Ok(true)
    }

    async fn set_private_clinic(&self, doctor_id: Uuid, clinic: &PrivateClinic) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.doctors.get_mut(&doctor_id) {
            Some(doctor) if doctor.private_clinic.is_none() => {
                doctor.private_clinic = Some(clinic.clone());
                doctor.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_clinic_timings(&self, doctor_id: Uuid, timings: Timings) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .doctors
            .get_mut(&doctor_id)
            .and_then(|d| d.private_clinic.as_mut())
        {
            Some(clinic) => {
                clinic.slot.timings = timings;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BookingRecordStore for MemoryStore {
    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn get_bookings(&self, booking_ids: &[Uuid]) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(booking_ids
            .iter()
            .filter_map(|id| state.bookings.get(id).cloned())
            .collect())
    }

    async fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn get_user_bookings(&self, user_id: Uuid) -> StoreResult<Option<UserBookings>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_booking_owner(&self, booking_id: Uuid) -> StoreResult<Option<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.holds(booking_id))
            .map(|u| u.user_id))
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    fn is_atomic(&self) -> bool {
        true
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard: Some(guard),
            journal: Vec::new(),
        }))
    }

    async fn release_bed_hold(&self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.beds.get_mut(&bed_id) {
            Some(bed) if bed.booking_id == Some(booking_id) => {
                bed.status = BedStatus::Available;
                bed.booking_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    journal: Vec<Prior>,
}

impl MemoryTransaction {
    fn state(&mut self) -> StoreResult<&mut MemoryState> {
        self.guard
            .as_deref_mut()
            .ok_or(StoreError::TransactionClosed)
    }

    fn undo(&mut self) {
        if let Some(state) = self.guard.as_deref_mut() {
            while let Some(prior) = self.journal.pop() {
                state.restore(prior);
            }
        }
        self.guard = None;
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.guard.is_some() {
            if !self.journal.is_empty() {
                warn!("Uncommitted transaction dropped, discarding {} writes", self.journal.len());
            }
            self.undo();
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn occupy_bed(&mut self, hospital_id: Uuid, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        let state = self.state()?;
        let Some(bed) = state.beds.get_mut(&bed_id) else {
            return Ok(false);
        };
        if bed.hospital_id != hospital_id || bed.status != BedStatus::Available {
            return Ok(false);
        }
        let prior = bed.clone();
        bed.status = BedStatus::Occupied;
        bed.booking_id = Some(booking_id);
        self.journal.push(Prior::Bed(bed_id, Some(prior)));
        Ok(true)
    }

    async fn release_bed(&mut self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        let state = self.state()?;
        let Some(bed) = state.beds.get_mut(&bed_id) else {
            return Ok(false);
        };
        if bed.status != BedStatus::Occupied || bed.booking_id != Some(booking_id) {
            return Ok(false);
        }
        let prior = bed.clone();
        bed.status = BedStatus::Available;
        bed.booking_id = None;
        self.journal.push(Prior::Bed(bed_id, Some(prior)));
        Ok(true)
    }

    async fn adjust_beds_available(&mut self, hospital_id: Uuid, delta: i32) -> StoreResult<bool> {
        let state = self.state()?;
        let Some(hospital) = state.hospitals.get_mut(&hospital_id) else {
            return Ok(false);
        };
        let Some(next) = hospital.adjusted_beds_available(delta) else {
            return Ok(false);
        };
        let prior = hospital.clone();
        hospital.beds_available = next;
        hospital.updated_at = Utc::now();
        self.journal.push(Prior::Hospital(hospital_id, Some(prior)));
        Ok(true)
    }

    async fn push_appointment(&mut self, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<SlotPush> {
        let state = self.state()?;
        let Some(doctor) = state.doctors.get_mut(&doctor_id) else {
            return Ok(SlotPush::MissingSlot);
        };
        let prior = doctor.clone();
        let Some(holder) = doctor.slot_mut(slot) else {
            return Ok(SlotPush::MissingSlot);
        };
        if !holder.has_capacity() {
            return Ok(SlotPush::Full);
        }
        holder.appointments.push(booking_id);
        self.journal.push(Prior::Doctor(doctor_id, Some(prior)));
        Ok(SlotPush::Pushed)
    }

    async fn pull_appointment(&mut self, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<bool> {
        let state = self.state()?;
        let Some(doctor) = state.doctors.get_mut(&doctor_id) else {
            return Ok(false);
        };
        let prior = doctor.clone();
        let Some(holder) = doctor.slot_mut(slot) else {
            return Ok(false);
        };
        if !holder.holds(booking_id) {
            return Ok(false);
        }
        holder.appointments.retain(|id| *id != booking_id);
        self.journal.push(Prior::Doctor(doctor_id, Some(prior)));
        Ok(true)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let state = self.state()?;
        let prior = state.bookings.insert(booking.id, booking.clone());
        self.journal.push(Prior::Booking(booking.id, prior));
        Ok(())
    }

    async fn update_booking_status(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<bool> {
        let state = self.state()?;
        let Some(booking) = state.bookings.get_mut(&booking_id) else {
            return Ok(false);
        };
        if booking.status != from {
            return Ok(false);
        }
        let prior = booking.clone();
        booking.status = to;
        booking.updated_at = Utc::now();
        self.journal.push(Prior::Booking(booking_id, Some(prior)));
        Ok(true)
    }

    async fn append_user_booking(&mut self, user_id: Uuid, role: Role, booking_id: Uuid) -> StoreResult<()> {
        let state = self.state()?;
        let prior = state.users.get(&user_id).cloned();
        state
            .users
            .entry(user_id)
            .or_insert_with(|| UserBookings::new(user_id, role))
            .bookings
            .push(booking_id);
        self.journal.push(Prior::User(user_id, prior));
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.guard.take().is_none() {
            return Err(StoreError::TransactionClosed);
        }
        debug!("Committed in-memory transaction with {} writes", self.journal.len());
        self.journal.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        debug!("Rolling back in-memory transaction with {} writes", self.journal.len());
        self.undo();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use shared_models::booking::BookingTarget;
    use shared_models::inventory::{Address, AppointmentSlot, Ward};

    fn address(city: &str) -> Address {
        Address {
            street: "1 Park Street".to_string(),
            city: city.to_string(),
            state: "West Bengal".to_string(),
            zip_code: "700016".to_string(),
            lat: None,
            lng: None,
        }
    }

    async fn seeded() -> (MemoryStore, Hospital, Bed) {
        let store = MemoryStore::new();
        let hospital = Hospital::new("General".into(), address("Kolkata"), "1234567890".into(), 1, true);
        let bed = Bed::new(hospital.id, Ward::General, "1".into());
        store.insert_hospital(&hospital).await.unwrap();
        store.insert_beds(std::slice::from_ref(&bed)).await.unwrap();
        (store, hospital, bed)
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let (store, hospital, bed) = seeded().await;
        let booking_id = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.occupy_bed(hospital.id, bed.id, booking_id).await.unwrap());
        assert!(tx.adjust_beds_available(hospital.id, -1).await.unwrap());
        tx.commit().await.unwrap();

        let bed = store.get_bed(bed.id).await.unwrap().unwrap();
        assert_eq!(bed.status, BedStatus::Occupied);
        assert_eq!(bed.booking_id, Some(booking_id));
        assert_eq!(store.get_hospital(hospital.id).await.unwrap().unwrap().beds_available, 0);
    }

    #[tokio::test]
    async fn rollback_restores_every_touched_record() {
        let (store, hospital, bed) = seeded().await;
        let user_id = Uuid::new_v4();
        let booking = Booking::new(
            "John".into(),
            "9876543210".into(),
            BookingTarget::BedBooking {
                hospital_id: hospital.id,
                bed_id: bed.id,
                check_in_date: Utc::now(),
                check_out_date: None,
            },
        );

        let mut tx = store.begin().await.unwrap();
        assert!(tx.occupy_bed(hospital.id, bed.id, booking.id).await.unwrap());
        assert!(tx.adjust_beds_available(hospital.id, -1).await.unwrap());
        tx.insert_booking(&booking).await.unwrap();
        tx.append_user_booking(user_id, Role::User, booking.id).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.get_bed(bed.id).await.unwrap().unwrap().is_available());
        assert_eq!(store.get_hospital(hospital.id).await.unwrap().unwrap().beds_available, 1);
        assert!(store.get_booking(booking.id).await.unwrap().is_none());
        assert!(store.get_user_bookings(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_transaction_is_discarded() {
        let (store, hospital, bed) = seeded().await;
        {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.occupy_bed(hospital.id, bed.id, Uuid::new_v4()).await.unwrap());
        }
        assert!(store.get_bed(bed.id).await.unwrap().unwrap().is_available());
    }

    #[tokio::test]
    async fn guards_reject_mismatched_predicates() {
        let (store, hospital, bed) = seeded().await;
        let mut tx = store.begin().await.unwrap();

        assert!(!tx.occupy_bed(Uuid::new_v4(), bed.id, Uuid::new_v4()).await.unwrap());
        assert!(!tx.adjust_beds_available(hospital.id, 1).await.unwrap());
        assert!(!tx.release_bed(bed.id, Uuid::new_v4()).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(tx.commit().await.unwrap_err().to_string(), StoreError::TransactionClosed.to_string());
    }

    #[tokio::test]
    async fn push_appointment_respects_capacity() {
        let store = MemoryStore::new();
        let mut doctor = Doctor::new("Dr. Rao".into(), "ENT".into(), "9000000001".into());
        doctor.private_clinic = Some(PrivateClinic {
            clinic_name: "Rao ENT".into(),
            address: address("Kolkata"),
            slot: AppointmentSlot::new(
                Timings {
                    start: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                },
                1,
            ),
        });
        store.insert_doctor(&doctor).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let first = Uuid::new_v4();
        assert_eq!(tx.push_appointment(doctor.id, SlotKey::Clinic, first).await.unwrap(), SlotPush::Pushed);
        assert_eq!(tx.push_appointment(doctor.id, SlotKey::Clinic, Uuid::new_v4()).await.unwrap(), SlotPush::Full);
        assert_eq!(
            tx.push_appointment(doctor.id, SlotKey::Hospital(Uuid::new_v4()), first).await.unwrap(),
            SlotPush::MissingSlot
        );
        assert!(tx.pull_appointment(doctor.id, SlotKey::Clinic, first).await.unwrap());
        assert!(!tx.pull_appointment(doctor.id, SlotKey::Clinic, first).await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn hospital_pages_follow_id_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let hospital = Hospital::new(format!("H{}", i), address("Kolkata"), format!("12345678{:02}", i), 3, false);
            store.insert_hospital(&hospital).await.unwrap();
        }
        let filter = HospitalFilter {
            city: Some("Kolkata".into()),
            ..HospitalFilter::default()
        };

        let first = store.list_hospitals(&filter, PageRequest::first(3)).await.unwrap();
        assert_eq!(first.len(), 3);
        let rest = store
            .list_hospitals(&filter, PageRequest { after: first.last().map(|h| h.id), limit: 3 })
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|h| h.id > first[2].id));
    }
}
