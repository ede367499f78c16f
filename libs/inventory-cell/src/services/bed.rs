use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_database::TransactionalStore;
use shared_models::inventory::{Bed, BedStatus, BedType};

use crate::models::{AvailableBed, InitBedsRequest, InventoryError};

pub struct BedService {
    store: Arc<dyn TransactionalStore>,
}

impl BedService {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Creates the hospital's beds once, numbered from 1 within each ward.
    pub async fn init_beds(&self, hospital_id: Uuid, request: InitBedsRequest) -> Result<Vec<Bed>, InventoryError> {
        let hospital = self
            .store
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound("Hospital".to_string()))?;

        if !self.store.list_beds(hospital_id, None).await?.is_empty() {
            return Err(InventoryError::Conflict("Hospital beds".to_string()));
        }

        let requested: u64 = request.wards.iter().map(|w| u64::from(w.count)).sum();
        if requested > u64::from(hospital.total_beds) {
            return Err(InventoryError::Validation(format!(
                "{} beds requested but the hospital has {}",
                requested, hospital.total_beds
            )));
        }

        let beds: Vec<Bed> = request
            .wards
            .iter()
            .flat_map(|w| (1..=w.count).map(move |n| Bed::new(hospital_id, w.ward, n.to_string())))
            .collect();
        self.store.insert_beds(&beds).await?;

        info!("Initialized {} beds for hospital {}", beds.len(), hospital_id);
        Ok(beds)
    }

    pub async fn available_beds(&self, hospital_id: Uuid) -> Result<Vec<AvailableBed>, InventoryError> {
        let hospital = self
            .store
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound("Hospital".to_string()))?;

        if hospital.beds_available == 0 {
            return Err(InventoryError::NoBedsAvailable);
        }

        let beds = self
            .store
            .list_beds(hospital_id, Some(BedStatus::Available))
            .await?;

        Ok(beds
            .into_iter()
            .map(|b| AvailableBed {
                id: b.id,
                ward: b.ward,
                bed_number: b.bed_number,
                bed_type: b.bed_type,
            })
            .collect())
    }

    pub async fn update_bed_type(&self, bed_id: Uuid, bed_type: BedType) -> Result<Bed, InventoryError> {
        match self.store.update_bed_type(bed_id, bed_type).await? {
            Some(bed) => {
                info!("Bed {} is now {:?}", bed_id, bed_type);
                Ok(bed)
            }
            None => {
                warn!("Bed {} not found for type update", bed_id);
                Err(InventoryError::NotFound("Bed".to_string()))
            }
        }
    }
}
