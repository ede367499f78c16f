use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{PageRequest, TransactionalStore};
use shared_models::inventory::{Affiliation, AppointmentSlot, Doctor, PrivateClinic, Timings};

use crate::models::{
    AddDoctorRequest, AffiliateDoctorRequest, ClinicDoctor, ClinicQuery, InventoryError, Page,
    SetClinicRequest, UpdateAffiliationRequest,
};

pub struct DoctorService {
    store: Arc<dyn TransactionalStore>,
    page_size: usize,
}

fn check_timings(timings: &Timings) -> Result<(), InventoryError> {
    if timings.start >= timings.end {
        return Err(InventoryError::Validation(
            "timings must end after they start".to_string(),
        ));
    }
    Ok(())
}

impl DoctorService {
    pub fn new(store: Arc<dyn TransactionalStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    pub async fn add_doctor(&self, request: AddDoctorRequest) -> Result<Doctor, InventoryError> {
        if self
            .store
            .find_doctor_by_contact(&request.contact_number)
            .await?
            .is_some()
        {
            warn!("Doctor with contact {} already exists", request.contact_number);
            return Err(InventoryError::Conflict("Doctor".to_string()));
        }

        let doctor = Doctor::new(request.name, request.specialty, request.contact_number);
        self.store.insert_doctor(&doctor).await?;

        info!("Doctor {} added", doctor.id);
        Ok(doctor)
    }

    /// Links the doctor and the hospital on both sides with a fresh appointment slot.
    pub async fn affiliate_doctor(
        &self,
        hospital_id: Uuid,
        request: AffiliateDoctorRequest,
    ) -> Result<Doctor, InventoryError> {
        check_timings(&request.timings)?;

        if self.store.get_hospital(hospital_id).await?.is_none() {
            return Err(InventoryError::NotFound("Hospital".to_string()));
        }
        let doctor = self.require_doctor(request.doctor_id).await?;
        if doctor.is_affiliated_with(hospital_id) {
            return Err(InventoryError::Conflict("Affiliation".to_string()));
        }

        let affiliation = Affiliation {
            hospital_id,
            slot: AppointmentSlot::new(request.timings, request.max_appointment),
        };
        if !self.store.add_affiliation(doctor.id, &affiliation).await? {
            return Err(InventoryError::Conflict("Affiliation".to_string()));
        }
        if !self.store.link_doctor(hospital_id, doctor.id).await? {
            return Err(InventoryError::NotFound("Hospital".to_string()));
        }

        info!("Doctor {} affiliated with hospital {}", doctor.id, hospital_id);
        self.require_doctor(doctor.id).await
    }

    /// Retimes an affiliation. Capacity may not drop below the appointments already held.
    pub async fn update_affiliation(
        &self,
        hospital_id: Uuid,
        doctor_id: Uuid,
        request: UpdateAffiliationRequest,
    ) -> Result<Doctor, InventoryError> {
        check_timings(&request.timings)?;

        let doctor = self.require_doctor(doctor_id).await?;
        let held = doctor
            .affiliation(hospital_id)
            .ok_or_else(|| InventoryError::NotFound("Affiliation".to_string()))?
            .slot
            .appointments
            .len();
        if held > request.max_appointment as usize {
            return Err(InventoryError::Validation(format!(
                "max_appointment {} is below the {} appointments already held",
                request.max_appointment, held
            )));
        }

        let updated = self
            .store
            .update_affiliation(doctor_id, hospital_id, request.timings, request.max_appointment)
            .await?;
        if !updated {
            return Err(InventoryError::Validation(
                "max_appointment is below the appointments already held".to_string(),
            ));
        }

        info!("Affiliation of doctor {} with hospital {} updated", doctor_id, hospital_id);
        self.require_doctor(doctor_id).await
    }

    pub async fn set_private_clinic(&self, doctor_id: Uuid, request: SetClinicRequest) -> Result<Doctor, InventoryError> {
        check_timings(&request.timings)?;

        let doctor = self.require_doctor(doctor_id).await?;
        if doctor.private_clinic.is_some() {
            return Err(InventoryError::Conflict("Private clinic".to_string()));
        }

        let clinic = PrivateClinic {
            clinic_name: request.clinic_name,
            address: request.address,
            slot: AppointmentSlot::new(request.timings, request.max_appointment),
        };
        if !self.store.set_private_clinic(doctor_id, &clinic).await? {
            return Err(InventoryError::Conflict("Private clinic".to_string()));
        }

        info!("Private clinic set for doctor {}", doctor_id);
        self.require_doctor(doctor_id).await
    }

    pub async fn update_clinic_timings(&self, doctor_id: Uuid, timings: Timings) -> Result<Doctor, InventoryError> {
        check_timings(&timings)?;

        if !self.store.update_clinic_timings(doctor_id, timings).await? {
            // Distinguish a missing doctor from a doctor without a clinic.
            self.require_doctor(doctor_id).await?;
            return Err(InventoryError::NotFound("Private clinic".to_string()));
        }

        self.require_doctor(doctor_id).await
    }

    /// Doctors with a private clinic in the city, ordered by id and paged after `last_id`.
    pub async fn list_clinic_doctors(&self, query: ClinicQuery) -> Result<Page<ClinicDoctor>, InventoryError> {
        let page = PageRequest {
            after: query.last_id,
            limit: self.page_size,
        };
        debug!("Listing clinics in {} after {:?}", query.city, page.after);

        let doctors = self.store.list_clinic_doctors(&query.city, page).await?;
        let clinics: Vec<ClinicDoctor> = doctors.iter().filter_map(ClinicDoctor::from_doctor).collect();

        Ok(Page::new(clinics, self.page_size, |c: &ClinicDoctor| c.id))
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, InventoryError> {
        self.store
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound("Doctor".to_string()))
    }
}
