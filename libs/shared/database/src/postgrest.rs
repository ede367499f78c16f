//! Supabase/PostgREST backend.
//!
//! PostgREST has no multi-request transactions, so every guarded primitive is a
//! single filtered PATCH or a server-side function, and a transaction keeps an
//! undo log of compensating writes that rollback replays in reverse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::booking::{Booking, BookingFilter, BookingStatus, UserBookings};
use shared_models::inventory::{
    Address, Affiliation, AppointmentSlot, Bed, BedStatus, BedType, Doctor, Hospital,
    PrivateClinic, SlotKey, Timings,
};

use crate::store::{
    BookingRecordStore, HospitalFilter, InventoryStore, PageRequest, SlotPush, StoreError,
    StoreResult, StoreTransaction, TransactionalStore,
};
use crate::supabase::SupabaseClient;

const DOCTOR_SELECT: &str = "select=*,appointment_slots(*)";

// ==============================================================================
// ROW MAPPING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SlotKind {
    Hospital,
    Clinic,
}

#[derive(Debug, Deserialize)]
struct SlotRow {
    kind: SlotKind,
    hospital_id: Option<Uuid>,
    clinic_name: Option<String>,
    address: Option<Address>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    max_appointment: u32,
    #[serde(default)]
    appointments: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    name: String,
    specialty: String,
    contact_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    appointment_slots: Vec<SlotRow>,
}

impl DoctorRow {
    fn into_doctor(self) -> Doctor {
        let mut affiliations = Vec::new();
        let mut private_clinic = None;

        for row in self.appointment_slots {
            let slot = AppointmentSlot {
                timings: Timings {
                    start: row.start_time,
                    end: row.end_time,
                },
                max_appointment: row.max_appointment,
                appointments: row.appointments,
            };
            match (row.kind, row.hospital_id, row.clinic_name, row.address) {
                (SlotKind::Hospital, Some(hospital_id), _, _) => {
                    affiliations.push(Affiliation { hospital_id, slot });
                }
                (SlotKind::Clinic, _, Some(clinic_name), Some(address)) => {
                    private_clinic = Some(PrivateClinic {
                        clinic_name,
                        address,
                        slot,
                    });
                }
                _ => warn!("Skipping malformed appointment slot row for doctor {}", self.id),
            }
        }

        Doctor {
            id: self.id,
            name: self.name,
            specialty: self.specialty,
            contact_number: self.contact_number,
            affiliations,
            private_clinic,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DoctorIdRow {
    doctor_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UserIdRow {
    user_id: Uuid,
}

fn slot_row(doctor_id: Uuid, key: SlotKey, slot: &AppointmentSlot, clinic: Option<(&str, &Address)>) -> Value {
    let (kind, clinic_name, address) = match (key, clinic) {
        (SlotKey::Clinic, Some((name, address))) => ("clinic", Some(name), Some(address)),
        _ => ("hospital", None, None),
    };
    json!({
        "doctor_id": doctor_id,
        "hospital_id": key.hospital_id(),
        "kind": kind,
        "clinic_name": clinic_name,
        "address": address,
        "start_time": slot.timings.start,
        "end_time": slot.timings.end,
        "max_appointment": slot.max_appointment,
        "appointments": slot.appointments,
    })
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

// ==============================================================================
// REST HELPERS
// ==============================================================================

/// Service-role access to the REST endpoint, shared by the store and its transactions.
#[derive(Clone)]
struct Rest {
    client: Arc<SupabaseClient>,
    token: Arc<str>,
}

impl Rest {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Vec<T>> {
        Ok(self
            .client
            .request(Method::GET, path, Some(self.token.as_ref()), None)
            .await?)
    }

    async fn first<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<T>> {
        Ok(self.get::<T>(path).await?.into_iter().next())
    }

    /// Write that echoes the affected rows; an empty result means the filter matched nothing.
    async fn write(&self, method: Method, path: &str, body: Value) -> StoreResult<Vec<Value>> {
        Ok(self
            .client
            .request_with_headers(
                method,
                path,
                Some(self.token.as_ref()),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await?)
    }

    async fn matched(&self, method: Method, path: &str, body: Value) -> StoreResult<bool> {
        Ok(!self.write(method, path, body).await?.is_empty())
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::DELETE,
                path,
                Some(self.token.as_ref()),
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn rpc<T: DeserializeOwned>(&self, function: &str, args: Value) -> StoreResult<T> {
        let path = format!("/rest/v1/rpc/{}", function);
        Ok(self
            .client
            .request(Method::POST, &path, Some(self.token.as_ref()), Some(args))
            .await?)
    }

    async fn doctors_by_id(&self, ids: &[Uuid]) -> StoreResult<Vec<Doctor>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("/rest/v1/doctors?id=in.({})&{}&order=id.asc", id_list(ids), DOCTOR_SELECT);
        let rows: Vec<DoctorRow> = self.get(&path).await?;
        Ok(rows.into_iter().map(DoctorRow::into_doctor).collect())
    }
}

pub struct PostgrestStore {
    rest: Rest,
}

impl PostgrestStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(
            Arc::new(SupabaseClient::new(config)),
            &config.supabase_service_role_key,
        )
    }

    pub fn with_client(client: Arc<SupabaseClient>, service_role_key: &str) -> Self {
        Self {
            rest: Rest {
                client,
                token: Arc::from(service_role_key),
            },
        }
    }
}

#[async_trait]
impl InventoryStore for PostgrestStore {
    async fn get_hospital(&self, hospital_id: Uuid) -> StoreResult<Option<Hospital>> {
        self.rest
            .first(&format!("/rest/v1/hospitals?id=eq.{}", hospital_id))
            .await
    }

    async fn find_hospital_by_contact(&self, contact_number: &str) -> StoreResult<Option<Hospital>> {
        let path = format!(
            "/rest/v1/hospitals?contact_number=eq.{}",
            urlencoding::encode(contact_number)
        );
        self.rest.first(&path).await
    }

    async fn list_hospitals(&self, filter: &HospitalFilter, page: PageRequest) -> StoreResult<Vec<Hospital>> {
        let mut query = vec![format!("order=id.asc&limit={}", page.limit)];
        if let Some(after) = page.after {
            query.push(format!("id=gt.{}", after));
        }
        if let Some(city) = &filter.city {
            query.push(format!("address->>city=eq.{}", urlencoding::encode(city)));
        }
        if let Some(emergency) = filter.emergency_services {
            query.push(format!("emergency_services=eq.{}", emergency));
        }
        if filter.with_available_beds {
            query.push("beds_available=gt.0".to_string());
        }

        self.rest
            .get(&format!("/rest/v1/hospitals?{}", query.join("&")))
            .await
    }

    async fn insert_hospital(&self, hospital: &Hospital) -> StoreResult<()> {
        self.rest
            .write(Method::POST, "/rest/v1/hospitals", serde_json::to_value(hospital)?)
            .await?;
        Ok(())
    }

    async fn link_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> StoreResult<bool> {
        self.rest
            .rpc(
                "link_hospital_doctor",
                json!({ "p_hospital_id": hospital_id, "p_doctor_id": doctor_id }),
            )
            .await
    }

    async fn get_bed(&self, bed_id: Uuid) -> StoreResult<Option<Bed>> {
        self.rest
            .first(&format!("/rest/v1/beds?id=eq.{}", bed_id))
            .await
    }

    async fn list_beds(&self, hospital_id: Uuid, status: Option<BedStatus>) -> StoreResult<Vec<Bed>> {
        let mut path = format!("/rest/v1/beds?hospital_id=eq.{}&order=bed_number.asc", hospital_id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        self.rest.get(&path).await
    }

    async fn insert_beds(&self, beds: &[Bed]) -> StoreResult<()> {
        if beds.is_empty() {
            return Ok(());
        }
        self.rest
            .write(Method::POST, "/rest/v1/beds", serde_json::to_value(beds)?)
            .await?;
        Ok(())
    }

    async fn update_bed_type(&self, bed_id: Uuid, bed_type: BedType) -> StoreResult<Option<Bed>> {
        let rows = self
            .rest
            .write(
                Method::PATCH,
                &format!("/rest/v1/beds?id=eq.{}", bed_id),
                json!({ "bed_type": bed_type }),
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        let row: Option<DoctorRow> = self
            .rest
            .first(&format!("/rest/v1/doctors?id=eq.{}&{}", doctor_id, DOCTOR_SELECT))
            .await?;
        Ok(row.map(DoctorRow::into_doctor))
    }

    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> StoreResult<Vec<Doctor>> {
        self.rest.doctors_by_id(doctor_ids).await
    }

    async fn find_doctor_by_contact(&self, contact_number: &str) -> StoreResult<Option<Doctor>> {
        let path = format!(
            "/rest/v1/doctors?contact_number=eq.{}&{}",
            urlencoding::encode(contact_number),
            DOCTOR_SELECT
        );
        let row: Option<DoctorRow> = self.rest.first(&path).await?;
        Ok(row.map(DoctorRow::into_doctor))
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let rows: Vec<DoctorRow> = self
            .rest
            .get(&format!("/rest/v1/doctors?{}&order=id.asc", DOCTOR_SELECT))
            .await?;
        Ok(rows.into_iter().map(DoctorRow::into_doctor).collect())
    }

    async fn list_clinic_doctors(&self, city: &str, page: PageRequest) -> StoreResult<Vec<Doctor>> {
        let mut path = format!(
            "/rest/v1/appointment_slots?select=doctor_id&kind=eq.clinic&address->>city=eq.{}&order=doctor_id.asc&limit={}",
            urlencoding::encode(city),
            page.limit
        );
        if let Some(after) = page.after {
            path.push_str(&format!("&doctor_id=gt.{}", after));
        }
        let ids: Vec<DoctorIdRow> = self.rest.get(&path).await?;
        let ids: Vec<Uuid> = ids.into_iter().map(|r| r.doctor_id).collect();
        self.rest.doctors_by_id(&ids).await
    }

    async fn insert_doctor(&self, doctor: &Doctor) -> StoreResult<()> {
        self.rest
            .write(
                Method::POST,
                "/rest/v1/doctors",
                json!({
                    "id": doctor.id,
                    "name": doctor.name,
                    "specialty": doctor.specialty,
                    "contact_number": doctor.contact_number,
                    "created_at": doctor.created_at,
                    "updated_at": doctor.updated_at,
                }),
            )
            .await?;

        let mut slots: Vec<Value> = doctor
            .affiliations
            .iter()
            .map(|a| slot_row(doctor.id, SlotKey::Hospital(a.hospital_id), &a.slot, None))
            .collect();
        if let Some(clinic) = &doctor.private_clinic {
            slots.push(slot_row(
                doctor.id,
                SlotKey::Clinic,
                &clinic.slot,
                Some((clinic.clinic_name.as_str(), &clinic.address)),
            ));
        }
        if !slots.is_empty() {
            self.rest
                .write(Method::POST, "/rest/v1/appointment_slots", Value::Array(slots))
                .await?;
        }
        Ok(())
    }

    async fn add_affiliation(&self, doctor_id: Uuid, affiliation: &Affiliation) -> StoreResult<bool> {
        match self.get_doctor(doctor_id).await? {
            Some(doctor) if !doctor.is_affiliated_with(affiliation.hospital_id) => {}
            _ => return Ok(false),
        }
        insert_slot_if_absent(
            &self.rest,
            slot_row(doctor_id, SlotKey::Hospital(affiliation.hospital_id), &affiliation.slot, None),
        )
        .await
    }

    async fn update_affiliation(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        timings: Timings,
        max_appointment: u32,
    ) -> StoreResult<bool> {
        self.rest
            .rpc(
                "update_slot_capacity",
                json!({
                    "p_doctor_id": doctor_id,
                    "p_hospital_id": hospital_id,
                    "p_start_time": timings.start,
                    "p_end_time": timings.end,
                    "p_max_appointment": max_appointment,
                }),
            )
            .await
    }

    async fn set_private_clinic(&self, doctor_id: Uuid, clinic: &PrivateClinic) -> StoreResult<bool> {
        match self.get_doctor(doctor_id).await? {
            Some(doctor) if doctor.private_clinic.is_none() => {}
            _ => return Ok(false),
        }
        insert_slot_if_absent(
            &self.rest,
            slot_row(
                doctor_id,
                SlotKey::Clinic,
                &clinic.slot,
                Some((clinic.clinic_name.as_str(), &clinic.address)),
            ),
        )
        .await
    }

    async fn update_clinic_timings(&self, doctor_id: Uuid, timings: Timings) -> StoreResult<bool> {
        self.rest
            .matched(
                Method::PATCH,
                &format!("/rest/v1/appointment_slots?doctor_id=eq.{}&kind=eq.clinic", doctor_id),
                json!({ "start_time": timings.start, "end_time": timings.end }),
            )
            .await
    }
}

/// Insert a slot row unless the doctor already has one under the same key.
async fn insert_slot_if_absent(rest: &Rest, row: Value) -> StoreResult<bool> {
    let mut headers = SupabaseClient::representation_headers();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
    );
    let rows: Vec<Value> = rest
        .client
        .request_with_headers(
            Method::POST,
            "/rest/v1/appointment_slots?on_conflict=doctor_id,slot_key",
            Some(rest.token.as_ref()),
            Some(row),
            Some(headers),
        )
        .await?;
    Ok(!rows.is_empty())
}

#[async_trait]
impl BookingRecordStore for PostgrestStore {
    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        self.rest
            .first(&format!("/rest/v1/bookings?id=eq.{}", booking_id))
            .await
    }

    async fn get_bookings(&self, booking_ids: &[Uuid]) -> StoreResult<Vec<Booking>> {
        if booking_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut found: Vec<Booking> = self
            .rest
            .get(&format!("/rest/v1/bookings?id=in.({})", id_list(booking_ids)))
            .await?;
        // Keep the caller's (history) order.
        found.sort_by_key(|b| booking_ids.iter().position(|id| *id == b.id));
        Ok(found)
    }

    async fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let mut query = vec!["order=created_at.asc".to_string()];
        if let Some(booking_type) = filter.booking_type {
            query.push(format!("booking_type=eq.{}", booking_type.as_str()));
        }
        if let Some(status) = filter.status {
            query.push(format!("status=eq.{}", status.as_str()));
        }
        if let Some(hospital_id) = filter.hospital_id {
            query.push(format!("hospital_id=eq.{}", hospital_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query.push(format!("doctor_id=eq.{}", doctor_id));
        }
        self.rest
            .get(&format!("/rest/v1/bookings?{}", query.join("&")))
            .await
    }

    async fn get_user_bookings(&self, user_id: Uuid) -> StoreResult<Option<UserBookings>> {
        self.rest
            .first(&format!("/rest/v1/user_bookings?user_id=eq.{}", user_id))
            .await
    }

    async fn find_booking_owner(&self, booking_id: Uuid) -> StoreResult<Option<Uuid>> {
        let row: Option<UserIdRow> = self
            .rest
            .first(&format!(
                "/rest/v1/user_bookings?select=user_id&bookings=cs.{{{}}}&limit=1",
                booking_id
            ))
            .await?;
        Ok(row.map(|r| r.user_id))
    }
}

#[async_trait]
impl TransactionalStore for PostgrestStore {
    fn is_atomic(&self) -> bool {
        false
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(PostgrestTransaction {
            rest: self.rest.clone(),
            undo: Vec::new(),
            closed: false,
        }))
    }

    async fn release_bed_hold(&self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        self.rest
            .matched(
                Method::PATCH,
                &format!("/rest/v1/beds?id=eq.{}&booking_id=eq.{}", bed_id, booking_id),
                json!({ "status": BedStatus::Available, "booking_id": Value::Null }),
            )
            .await
    }
}

// ==============================================================================
// TRANSACTION
// ==============================================================================

/// Write that undoes one applied step.
#[derive(Debug, Clone)]
enum Compensation {
    ReleaseBed { bed_id: Uuid, booking_id: Uuid },
    ReoccupyBed { bed_id: Uuid, booking_id: Uuid },
    AdjustBeds { hospital_id: Uuid, delta: i32 },
    PullAppointment { doctor_id: Uuid, slot: SlotKey, booking_id: Uuid },
    PushAppointment { doctor_id: Uuid, slot: SlotKey, booking_id: Uuid },
    DeleteBooking { booking_id: Uuid },
    RestoreBookingStatus { booking_id: Uuid, from: BookingStatus, to: BookingStatus },
    RemoveUserBooking { user_id: Uuid, booking_id: Uuid },
}

impl Compensation {
    async fn apply(&self, rest: &Rest) -> StoreResult<bool> {
        match *self {
            Compensation::ReleaseBed { bed_id, booking_id } => {
                rest.matched(
                    Method::PATCH,
                    &format!("/rest/v1/beds?id=eq.{}&booking_id=eq.{}", bed_id, booking_id),
                    json!({ "status": BedStatus::Available, "booking_id": Value::Null }),
                )
                .await
            }
            Compensation::ReoccupyBed { bed_id, booking_id } => {
                rest.matched(
                    Method::PATCH,
                    &format!("/rest/v1/beds?id=eq.{}&status=eq.available", bed_id),
                    json!({ "status": BedStatus::Occupied, "booking_id": booking_id }),
                )
                .await
            }
            Compensation::AdjustBeds { hospital_id, delta } => {
                adjust_beds(rest, hospital_id, delta).await
            }
            Compensation::PullAppointment { doctor_id, slot, booking_id } => {
                pull_appointment(rest, doctor_id, slot, booking_id).await
            }
            Compensation::PushAppointment { doctor_id, slot, booking_id } => {
                Ok(push_appointment(rest, doctor_id, slot, booking_id).await? == SlotPush::Pushed)
            }
            Compensation::DeleteBooking { booking_id } => {
                rest.delete(&format!("/rest/v1/bookings?id=eq.{}", booking_id))
                    .await
            }
            Compensation::RestoreBookingStatus { booking_id, from, to } => {
                rest.matched(
                    Method::PATCH,
                    &format!("/rest/v1/bookings?id=eq.{}&status=eq.{}", booking_id, to.as_str()),
                    json!({ "status": from, "updated_at": Utc::now() }),
                )
                .await
            }
            Compensation::RemoveUserBooking { user_id, booking_id } => {
                rest.rpc(
                    "remove_user_booking",
                    json!({ "p_user_id": user_id, "p_booking_id": booking_id }),
                )
                .await
            }
        }
    }
}

async fn adjust_beds(rest: &Rest, hospital_id: Uuid, delta: i32) -> StoreResult<bool> {
    rest.rpc(
        "adjust_beds_available",
        json!({ "p_hospital_id": hospital_id, "p_delta": delta }),
    )
    .await
}

async fn push_appointment(rest: &Rest, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<SlotPush> {
    let outcome: String = rest
        .rpc(
            "push_appointment",
            json!({
                "p_doctor_id": doctor_id,
                "p_hospital_id": slot.hospital_id(),
                "p_booking_id": booking_id,
            }),
        )
        .await?;
    match outcome.as_str() {
        "pushed" => Ok(SlotPush::Pushed),
        "full" => Ok(SlotPush::Full),
        "missing_slot" => Ok(SlotPush::MissingSlot),
        other => Err(StoreError::UnexpectedResponse(format!(
            "push_appointment returned {:?}",
            other
        ))),
    }
}

async fn pull_appointment(rest: &Rest, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<bool> {
    rest.rpc(
        "pull_appointment",
        json!({
            "p_doctor_id": doctor_id,
            "p_hospital_id": slot.hospital_id(),
            "p_booking_id": booking_id,
        }),
    )
    .await
}

/// Replays compensations newest first. Failures are logged and the rest still run.
async fn compensate(rest: &Rest, undo: Vec<Compensation>) {
    for step in undo.into_iter().rev() {
        match step.apply(rest).await {
            Ok(true) => debug!("Compensated {:?}", step),
            Ok(false) => warn!("Compensation {:?} matched nothing", step),
            Err(e) => error!("Compensation {:?} failed: {}", step, e),
        }
    }
}

pub struct PostgrestTransaction {
    rest: Rest,
    undo: Vec<Compensation>,
    closed: bool,
}

impl PostgrestTransaction {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for PostgrestTransaction {
    fn drop(&mut self) {
        if self.closed || self.undo.is_empty() {
            return;
        }
        let undo = std::mem::take(&mut self.undo);
        warn!("Uncommitted transaction dropped, compensating {} writes", undo.len());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let rest = self.rest.clone();
                handle.spawn(async move { compensate(&rest, undo).await });
            }
            Err(_) => error!("No runtime available to compensate {} writes", undo.len()),
        }
    }
}

#[async_trait]
impl StoreTransaction for PostgrestTransaction {
    async fn occupy_bed(&mut self, hospital_id: Uuid, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        self.ensure_open()?;
        let path = format!(
            "/rest/v1/beds?id=eq.{}&hospital_id=eq.{}&status=eq.available",
            bed_id, hospital_id
        );
        let occupied = self
            .rest
            .matched(
                Method::PATCH,
                &path,
                json!({ "status": BedStatus::Occupied, "booking_id": booking_id }),
            )
            .await?;
        if occupied {
            self.undo.push(Compensation::ReleaseBed { bed_id, booking_id });
        }
        Ok(occupied)
    }

    async fn release_bed(&mut self, bed_id: Uuid, booking_id: Uuid) -> StoreResult<bool> {
        self.ensure_open()?;
        let path = format!(
            "/rest/v1/beds?id=eq.{}&status=eq.occupied&booking_id=eq.{}",
            bed_id, booking_id
        );
        let released = self
            .rest
            .matched(
                Method::PATCH,
                &path,
                json!({ "status": BedStatus::Available, "booking_id": Value::Null }),
            )
            .await?;
        if released {
            self.undo.push(Compensation::ReoccupyBed { bed_id, booking_id });
        }
        Ok(released)
    }

    async fn adjust_beds_available(&mut self, hospital_id: Uuid, delta: i32) -> StoreResult<bool> {
        self.ensure_open()?;
        let adjusted = adjust_beds(&self.rest, hospital_id, delta).await?;
        if adjusted {
            self.undo.push(Compensation::AdjustBeds { hospital_id, delta: -delta });
        }
        Ok(adjusted)
    }

    async fn push_appointment(&mut self, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<SlotPush> {
        self.ensure_open()?;
        let outcome = push_appointment(&self.rest, doctor_id, slot, booking_id).await?;
        if outcome == SlotPush::Pushed {
            self.undo.push(Compensation::PullAppointment { doctor_id, slot, booking_id });
        }
        Ok(outcome)
    }

    async fn pull_appointment(&mut self, doctor_id: Uuid, slot: SlotKey, booking_id: Uuid) -> StoreResult<bool> {
        self.ensure_open()?;
        let pulled = pull_appointment(&self.rest, doctor_id, slot, booking_id).await?;
        if pulled {
            self.undo.push(Compensation::PushAppointment { doctor_id, slot, booking_id });
        }
        Ok(pulled)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.ensure_open()?;
        self.rest
            .write(Method::POST, "/rest/v1/bookings", serde_json::to_value(booking)?)
            .await?;
        self.undo.push(Compensation::DeleteBooking { booking_id: booking.id });
        Ok(())
    }

    async fn update_booking_status(
        &mut self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<bool> {
        self.ensure_open()?;
        let updated = self
            .rest
            .matched(
                Method::PATCH,
                &format!("/rest/v1/bookings?id=eq.{}&status=eq.{}", booking_id, from.as_str()),
                json!({ "status": to, "updated_at": Utc::now() }),
            )
            .await?;
        if updated {
            self.undo.push(Compensation::RestoreBookingStatus { booking_id, from, to });
        }
        Ok(updated)
    }

    async fn append_user_booking(&mut self, user_id: Uuid, role: Role, booking_id: Uuid) -> StoreResult<()> {
        self.ensure_open()?;
        let _: bool = self
            .rest
            .rpc(
                "append_user_booking",
                json!({
                    "p_user_id": user_id,
                    "p_role": role.as_str(),
                    "p_booking_id": booking_id,
                }),
            )
            .await?;
        self.undo.push(Compensation::RemoveUserBooking { user_id, booking_id });
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        debug!("Committed PostgREST transaction with {} writes", self.undo.len());
        self.undo.clear();
        self.closed = true;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.closed = true;
        let undo = std::mem::take(&mut self.undo);
        debug!("Rolling back PostgREST transaction, compensating {} writes", undo.len());
        compensate(&self.rest, undo).await;
        Ok(())
    }
}
