//! Booking transaction engine.
//!
//! Every reservation and cancellation is one store transaction made of guarded
//! primitives. A guard that does not match means another request won the race:
//! the transaction is rolled back and the loss is reported at once, never retried.
//! Unexpected failures roll back as well and surface as `TransactionFailed`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::{SlotPush, StoreTransaction, TransactionalStore};
use shared_models::auth::Identity;
use shared_models::booking::{Booking, BookingStatus, BookingTarget};
use shared_models::inventory::SlotKey;

use crate::models::{BookingError, ReserveAppointmentRequest, ReserveBedRequest};

pub struct BookingEngine {
    store: Arc<dyn TransactionalStore>,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Occupies the bed, takes one unit off the hospital counter, records the
    /// booking as Confirmed and appends it to the caller's history.
    pub async fn reserve_bed(
        &self,
        identity: &Identity,
        request: ReserveBedRequest,
    ) -> Result<Booking, BookingError> {
        let ReserveBedRequest {
            hospital_id,
            bed_id,
            patient_name,
            patient_contact,
            check_in_date,
            check_out_date,
        } = request;

        let mut booking = Booking::new(
            patient_name,
            patient_contact,
            BookingTarget::BedBooking {
                hospital_id,
                bed_id,
                check_in_date,
                check_out_date,
            },
        );

        debug!("Reserving bed {} at hospital {} as booking {}", bed_id, hospital_id, booking.id);

        let mut tx = self.store.begin().await?;
        let outcome = Self::hold_bed(tx.as_mut(), identity, &mut booking, hospital_id, bed_id).await;

        match outcome {
            Ok(()) => {
                info!("Bed {} reserved by user {} (booking {})", bed_id, identity.user_id, booking.id);
                Ok(booking)
            }
            Err(BookingError::ResourceUnavailable) => {
                warn!("Bed {} at hospital {} is no longer available", bed_id, hospital_id);
                Self::abort(tx).await;
                Err(BookingError::ResourceUnavailable)
            }
            Err(e) => {
                error!("Bed reservation {} failed: {}", booking.id, e);
                Self::abort(tx).await;
                // Compensating backends may leave the bed held by a booking that was never recorded.
                if !self.store.is_atomic() {
                    match self.store.release_bed_hold(bed_id, booking.id).await {
                        Ok(true) => warn!("Released bed {} left held by failed booking {}", bed_id, booking.id),
                        Ok(false) => {}
                        Err(release_err) => error!(
                            "Failed to release bed {} after failed booking {}: {}",
                            bed_id, booking.id, release_err
                        ),
                    }
                }
                Err(BookingError::TransactionFailed(e.to_string()))
            }
        }
    }

    async fn hold_bed(
        tx: &mut dyn StoreTransaction,
        identity: &Identity,
        booking: &mut Booking,
        hospital_id: Uuid,
        bed_id: Uuid,
    ) -> Result<(), BookingError> {
        if !tx.occupy_bed(hospital_id, bed_id, booking.id).await? {
            return Err(BookingError::ResourceUnavailable);
        }
        if !tx.adjust_beds_available(hospital_id, -1).await? {
            return Err(BookingError::ResourceUnavailable);
        }
        Self::record(tx, identity, booking).await
    }

    /// Appends the booking to the doctor's affiliation slot (with a hospital id)
    /// or private-clinic slot (without one), within the slot's capacity.
    pub async fn reserve_appointment(
        &self,
        identity: &Identity,
        request: ReserveAppointmentRequest,
    ) -> Result<Booking, BookingError> {
        let ReserveAppointmentRequest {
            hospital_id,
            doctor_id,
            patient_name,
            patient_contact,
            appointment_date,
        } = request;

        let doctor = self
            .store
            .get_doctor(doctor_id)
            .await?
            .ok_or(BookingError::DoctorNotFound)?;

        let (slot, target) = match hospital_id {
            Some(hospital_id) => (
                SlotKey::Hospital(hospital_id),
                BookingTarget::DoctorAppointment {
                    doctor_id,
                    hospital_id,
                    appointment_date,
                },
            ),
            None => (
                SlotKey::Clinic,
                BookingTarget::ClinicAppointment {
                    doctor_id,
                    appointment_date,
                },
            ),
        };

        if doctor.slot(slot).is_none() {
            return Err(missing_slot(slot));
        }

        let mut booking = Booking::new(patient_name, patient_contact, target);
        debug!("Reserving {:?} of doctor {} as booking {}", slot, doctor_id, booking.id);

        let mut tx = self.store.begin().await?;
        let outcome = Self::hold_slot(tx.as_mut(), identity, &mut booking, doctor_id, slot).await;

        match outcome {
            Ok(()) => {
                info!(
                    "Appointment with doctor {} reserved by user {} (booking {})",
                    doctor_id, identity.user_id, booking.id
                );
                Ok(booking)
            }
            Err(
                e @ (BookingError::CapacityExceeded
                | BookingError::AffiliationNotFound
                | BookingError::ClinicNotFound),
            ) => {
                warn!("Appointment with doctor {} rejected: {}", doctor_id, e);
                Self::abort(tx).await;
                Err(e)
            }
            Err(e) => {
                error!("Appointment reservation {} failed: {}", booking.id, e);
                Self::abort(tx).await;
                Err(BookingError::TransactionFailed(e.to_string()))
            }
        }
    }

    async fn hold_slot(
        tx: &mut dyn StoreTransaction,
        identity: &Identity,
        booking: &mut Booking,
        doctor_id: Uuid,
        slot: SlotKey,
    ) -> Result<(), BookingError> {
        match tx.push_appointment(doctor_id, slot, booking.id).await? {
            SlotPush::Pushed => {}
            SlotPush::Full => return Err(BookingError::CapacityExceeded),
            SlotPush::MissingSlot => return Err(missing_slot(slot)),
        }
        Self::record(tx, identity, booking).await
    }

    /// Confirms the booking, persists it and links it to the caller, then commits.
    async fn record(
        tx: &mut dyn StoreTransaction,
        identity: &Identity,
        booking: &mut Booking,
    ) -> Result<(), BookingError> {
        booking
            .transition(BookingStatus::Confirmed)
            .map_err(|(from, to)| BookingError::InvalidState(format!("{} -> {}", from, to)))?;
        tx.insert_booking(booking).await?;
        tx.append_user_booking(identity.user_id, identity.role, booking.id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Releases the resource held by a Confirmed booking and marks it Cancelled.
    /// The booking stays in its owner's history.
    pub async fn cancel_booking(
        &self,
        identity: &Identity,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let mut booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::InvalidBookingId)?;
        let owner = self
            .store
            .find_booking_owner(booking_id)
            .await?
            .ok_or(BookingError::InvalidBookingId)?;

        if owner != identity.user_id && !identity.is_admin() {
            warn!("User {} tried to cancel booking {} owned by {}", identity.user_id, booking_id, owner);
            return Err(BookingError::AccessForbidden);
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidState(format!(
                "booking is {}",
                booking.status
            )));
        }

        let mut tx = self.store.begin().await?;
        let outcome = Self::release(tx.as_mut(), &booking).await;

        match outcome {
            Ok(()) => {
                booking
                    .transition(BookingStatus::Cancelled)
                    .map_err(|(from, to)| BookingError::InvalidState(format!("{} -> {}", from, to)))?;
                info!("Booking {} cancelled by user {}", booking_id, identity.user_id);
                Ok(booking)
            }
            Err(e @ BookingError::InvalidState(_)) => {
                warn!("Booking {} could not be cancelled: {}", booking_id, e);
                Self::abort(tx).await;
                Err(e)
            }
            Err(e) => {
                error!("Cancellation of booking {} failed: {}", booking_id, e);
                Self::abort(tx).await;
                Err(BookingError::TransactionFailed(e.to_string()))
            }
        }
    }

    async fn release(tx: &mut dyn StoreTransaction, booking: &Booking) -> Result<(), BookingError> {
        let released = match booking.target {
            BookingTarget::BedBooking {
                hospital_id,
                bed_id,
                ..
            } => {
                tx.release_bed(bed_id, booking.id).await?
                    && tx.adjust_beds_available(hospital_id, 1).await?
            }
            BookingTarget::ClinicAppointment { doctor_id, .. } => {
                tx.pull_appointment(doctor_id, SlotKey::Clinic, booking.id)
                    .await?
            }
            BookingTarget::DoctorAppointment {
                doctor_id,
                hospital_id,
                ..
            } => {
                tx.pull_appointment(doctor_id, SlotKey::Hospital(hospital_id), booking.id)
                    .await?
            }
        };
        if !released {
            return Err(BookingError::InvalidState(
                "reserved resource is not held by this booking".to_string(),
            ));
        }

        if !tx
            .update_booking_status(booking.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await?
        {
            return Err(BookingError::InvalidState(
                "booking was changed concurrently".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn abort(mut tx: Box<dyn StoreTransaction>) {
        if let Err(e) = tx.rollback().await {
            // Already closed after a failed commit; nothing left to undo here.
            debug!("Rollback skipped: {}", e);
        }
    }
}

fn missing_slot(slot: SlotKey) -> BookingError {
    match slot {
        SlotKey::Hospital(_) => BookingError::AffiliationNotFound,
        SlotKey::Clinic => BookingError::ClinicNotFound,
    }
}
