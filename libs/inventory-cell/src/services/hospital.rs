use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{HospitalFilter, PageRequest, TransactionalStore};
use shared_models::inventory::Hospital;

use crate::models::{
    AddHospitalRequest, AffiliatedDoctor, DoctorCandidate, HospitalListing, HospitalQuery,
    InventoryError, Page,
};

pub struct HospitalService {
    store: Arc<dyn TransactionalStore>,
    page_size: usize,
}

impl HospitalService {
    pub fn new(store: Arc<dyn TransactionalStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    /// Registers a hospital with every bed available. Contact numbers are unique.
    pub async fn add_hospital(&self, request: AddHospitalRequest) -> Result<Hospital, InventoryError> {
        if self
            .store
            .find_hospital_by_contact(&request.contact_number)
            .await?
            .is_some()
        {
            warn!("Hospital with contact {} already exists", request.contact_number);
            return Err(InventoryError::Conflict("Hospital".to_string()));
        }

        let hospital = Hospital::new(
            request.name,
            request.address,
            request.contact_number,
            request.total_beds,
            request.emergency_services,
        );
        self.store.insert_hospital(&hospital).await?;

        info!("Hospital {} added with {} beds", hospital.id, hospital.total_beds);
        Ok(hospital)
    }

    /// Hospitals that still have beds, ordered by id and paged after `last_id`.
    pub async fn list_hospitals(&self, query: HospitalQuery) -> Result<Page<HospitalListing>, InventoryError> {
        let filter = HospitalFilter {
            city: query.city,
            emergency_services: query.emergency,
            with_available_beds: true,
        };
        let page = PageRequest {
            after: query.last_id,
            limit: self.page_size,
        };

        debug!("Listing hospitals with {:?} after {:?}", filter, page.after);
        let hospitals = self.store.list_hospitals(&filter, page).await?;

        let listings = hospitals
            .into_iter()
            .map(|h| HospitalListing {
                id: h.id,
                name: h.name,
                address: h.address,
                contact_number: h.contact_number,
                beds_available: h.beds_available,
                emergency_services: h.emergency_services,
            })
            .collect();

        Ok(Page::new(listings, self.page_size, |h: &HospitalListing| h.id))
    }

    pub async fn hospital_doctors(&self, hospital_id: Uuid) -> Result<Vec<AffiliatedDoctor>, InventoryError> {
        let hospital = self.require_hospital(hospital_id).await?;
        let doctors = self.store.get_doctors(&hospital.doctors).await?;

        Ok(doctors
            .into_iter()
            .filter_map(|doctor| {
                let slot = doctor.affiliation(hospital_id)?.slot.clone();
                Some(AffiliatedDoctor {
                    id: doctor.id,
                    name: doctor.name,
                    specialty: doctor.specialty,
                    contact_number: doctor.contact_number,
                    timings: slot.timings,
                    max_appointment: slot.max_appointment,
                    remaining: slot.remaining(),
                })
            })
            .collect())
    }

    /// Doctors that could still be affiliated with the hospital.
    pub async fn unaffiliated_doctors(&self, hospital_id: Uuid) -> Result<Vec<DoctorCandidate>, InventoryError> {
        self.require_hospital(hospital_id).await?;
        let doctors = self.store.list_doctors().await?;

        Ok(doctors
            .into_iter()
            .filter(|d| !d.is_affiliated_with(hospital_id))
            .map(|d| DoctorCandidate {
                id: d.id,
                name: d.name,
                specialty: d.specialty,
            })
            .collect())
    }

    async fn require_hospital(&self, hospital_id: Uuid) -> Result<Hospital, InventoryError> {
        self.store
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound("Hospital".to_string()))
    }
}
