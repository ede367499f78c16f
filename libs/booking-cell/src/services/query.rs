use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::TransactionalStore;
use shared_models::auth::Identity;
use shared_models::booking::{Booking, BookingFilter, BookingStatus, BookingType};
use shared_models::inventory::{Bed, Doctor, Hospital};

use crate::models::{BedSummary, BookingError, BookingView, DoctorSummary, HospitalSummary};

/// Read side of bookings: user histories and per-resource booking lists.
pub struct BookingQueryService {
    store: Arc<dyn TransactionalStore>,
}

impl BookingQueryService {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// The caller's bookings in history order. No history yet means no bookings.
    pub async fn list_user_bookings(&self, identity: &Identity) -> Result<Vec<BookingView>, BookingError> {
        let Some(history) = self.store.get_user_bookings(identity.user_id).await? else {
            debug!("User {} has no booking history", identity.user_id);
            return Ok(Vec::new());
        };

        let bookings = self.store.get_bookings(&history.bookings).await?;
        if bookings.len() != history.bookings.len() {
            warn!(
                "User {} history references {} bookings but only {} exist",
                identity.user_id,
                history.bookings.len(),
                bookings.len()
            );
        }
        self.join(bookings).await
    }

    pub async fn get_booking(&self, identity: &Identity, booking_id: Uuid) -> Result<BookingView, BookingError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Booking".to_string()))?;

        if !identity.is_admin() {
            let owner = self.store.find_booking_owner(booking_id).await?;
            if owner != Some(identity.user_id) {
                warn!("User {} denied access to booking {}", identity.user_id, booking_id);
                return Err(BookingError::AccessForbidden);
            }
        }

        let mut views = self.join(vec![booking]).await?;
        views
            .pop()
            .ok_or_else(|| BookingError::NotFound("Booking".to_string()))
    }

    /// Confirmed bed bookings of a hospital.
    pub async fn bed_bookings(&self, hospital_id: Uuid) -> Result<Vec<BookingView>, BookingError> {
        self.require_hospital(hospital_id).await?;
        self.confirmed(BookingFilter {
            booking_type: Some(BookingType::BedBooking),
            hospital_id: Some(hospital_id),
            ..BookingFilter::default()
        })
        .await
    }

    /// Confirmed appointments against one doctor's affiliation with a hospital.
    pub async fn doctor_bookings(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Vec<BookingView>, BookingError> {
        self.require_hospital(hospital_id).await?;
        let doctor = self.require_doctor(doctor_id).await?;
        if !doctor.is_affiliated_with(hospital_id) {
            return Err(BookingError::AffiliationNotFound);
        }
        self.confirmed(BookingFilter {
            booking_type: Some(BookingType::DoctorAppointment),
            hospital_id: Some(hospital_id),
            doctor_id: Some(doctor_id),
            ..BookingFilter::default()
        })
        .await
    }

    pub async fn clinic_bookings(&self, doctor_id: Uuid) -> Result<Vec<BookingView>, BookingError> {
        let doctor = self.require_doctor(doctor_id).await?;
        if doctor.private_clinic.is_none() {
            return Err(BookingError::ClinicNotFound);
        }
        self.confirmed(BookingFilter {
            booking_type: Some(BookingType::ClinicAppointment),
            doctor_id: Some(doctor_id),
            ..BookingFilter::default()
        })
        .await
    }

    async fn confirmed(&self, filter: BookingFilter) -> Result<Vec<BookingView>, BookingError> {
        let filter = BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..filter
        };
        let bookings = self.store.find_bookings(&filter).await?;
        self.join(bookings).await
    }

    async fn require_hospital(&self, hospital_id: Uuid) -> Result<Hospital, BookingError> {
        self.store
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Hospital".to_string()))
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, BookingError> {
        self.store
            .get_doctor(doctor_id)
            .await?
            .ok_or(BookingError::DoctorNotFound)
    }

    /// Attaches hospital, doctor and bed summaries, fetching each record once.
    async fn join(&self, bookings: Vec<Booking>) -> Result<Vec<BookingView>, BookingError> {
        let mut hospitals: HashMap<Uuid, Option<Hospital>> = HashMap::new();
        let mut doctors: HashMap<Uuid, Option<Doctor>> = HashMap::new();
        let mut beds: HashMap<Uuid, Option<Bed>> = HashMap::new();

        let mut views = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let target = &booking.target;

            let hospital = match target.hospital_id() {
                Some(id) => {
                    if !hospitals.contains_key(&id) {
                        hospitals.insert(id, self.store.get_hospital(id).await?);
                    }
                    hospitals.get(&id).and_then(Option::as_ref).map(|h| HospitalSummary {
                        id: h.id,
                        name: h.name.clone(),
                        contact_number: h.contact_number.clone(),
                        address: h.address.clone(),
                    })
                }
                None => None,
            };

            let doctor = match target.doctor_id() {
                Some(id) => {
                    if !doctors.contains_key(&id) {
                        doctors.insert(id, self.store.get_doctor(id).await?);
                    }
                    doctors.get(&id).and_then(Option::as_ref).map(|d| {
                        let slot = target.slot_key().and_then(|key| d.slot(key));
                        DoctorSummary {
                            id: d.id,
                            name: d.name.clone(),
                            specialty: d.specialty.clone(),
                            contact_number: d.contact_number.clone(),
                            timings: slot.map(|s| s.timings),
                            clinic_name: match target.hospital_id() {
                                None => d.private_clinic.as_ref().map(|c| c.clinic_name.clone()),
                                Some(_) => None,
                            },
                        }
                    })
                }
                None => None,
            };

            let bed = match target.bed_id() {
                Some(id) => {
                    if !beds.contains_key(&id) {
                        beds.insert(id, self.store.get_bed(id).await?);
                    }
                    beds.get(&id).and_then(Option::as_ref).map(|b| BedSummary {
                        id: b.id,
                        ward: b.ward,
                        bed_number: b.bed_number.clone(),
                        bed_type: b.bed_type,
                    })
                }
                None => None,
            };

            views.push(BookingView {
                booking,
                hospital,
                doctor,
                bed,
            });
        }

        Ok(views)
    }
}
