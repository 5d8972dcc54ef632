//! Medication catalog: lookups, idempotent upserts and cabinet stocking
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use crate::care_db::{CabinetBox, CareDatabase, Medication};
use crate::error::{CareError, CareResult};
use crate::lookup::{MedicationLookup, MedicationSummary};

/// One medication to place in a cabinet box
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CabinetItem {
    #[validate(length(min = 1))]
    pub external_id: String,
    #[serde(rename = "box")]
    #[validate(range(min = 0))]
    pub box_number: i32,
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockCabinetRequest {
    #[validate]
    pub medications: Vec<CabinetItem>,
}

/// Stored medication with the NDC codes written alongside it
#[derive(Debug, Clone, Serialize)]
pub struct StoredMedication {
    #[serde(flatten)]
    pub medication: Medication,
    pub ndc_codes: Vec<String>,
}

pub struct CatalogService {
    db: Arc<CareDatabase>,
    lookup: Arc<dyn MedicationLookup>,
}

impl CatalogService {
    pub fn new(db: Arc<CareDatabase>, lookup: Arc<dyn MedicationLookup>) -> Self {
        Self { db, lookup }
    }

    pub async fn search(&self, query: &str) -> CareResult<Vec<MedicationSummary>> {
        self.lookup.search_medications(query).await
    }

    pub async fn get_by_id(&self, external_id: &str) -> CareResult<Option<MedicationSummary>> {
        self.lookup.get_medication_by_id(external_id).await
    }

    async fn fetch_required(&self, external_id: &str) -> CareResult<MedicationSummary> {
        self.lookup
            .get_medication_by_id(external_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("medication {}", external_id)))
    }

    /// Looks the id up and writes the latest snapshot. Repeated calls with the
    /// same id converge to one medication row and one NDC row per code.
    pub async fn upsert_medication(&self, external_id: &str) -> CareResult<StoredMedication> {
        let summary = self.fetch_required(external_id).await?;

        self.db
            .with_transaction(|conn| {
                let medication = self.db.medications.upsert_with_conn(conn, &summary)?;
                Ok(StoredMedication {
                    medication,
                    ndc_codes: summary.ndc_codes.clone(),
                })
            })
            .map_err(CareError::into_transaction_failure)
    }

    /// Places looked-up medications into the cabinet's boxes. All lookups
    /// complete before the transaction opens; every row commits together.
    pub async fn stock_cabinet(
        &self,
        cabinet_id: i64,
        request: &StockCabinetRequest,
    ) -> CareResult<Vec<CabinetBox>> {
        request.validate()?;

        let mut resolved = Vec::with_capacity(request.medications.len());
        for item in &request.medications {
            resolved.push((self.fetch_required(&item.external_id).await?, item));
        }

        let result = self.db.with_transaction(|conn| {
            if self.db.cabinets.get_cabinet_with_conn(conn, cabinet_id)?.is_none() {
                return Err(CareError::NotFound(format!("cabinet {}", cabinet_id)));
            }

            let mut boxes = Vec::with_capacity(resolved.len());
            for (summary, item) in &resolved {
                let medication = self.db.medications.upsert_with_conn(conn, summary)?;
                boxes.push(self.db.cabinets.upsert_box_with_conn(
                    conn,
                    cabinet_id,
                    medication.id,
                    item.box_number,
                    item.quantity,
                )?);
            }
            Ok(boxes)
        });

        match result {
            Ok(boxes) => {
                info!("Stocked cabinet {} with {} medication(s)", cabinet_id, boxes.len());
                Ok(boxes)
            }
            Err(e) => {
                error!("Failed to stock cabinet {}: {}", cabinet_id, e);
                Err(e.into_transaction_failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_patient, summary, temp_database, StaticLookup};

    fn service(db: Arc<CareDatabase>) -> CatalogService {
        let lookup = StaticLookup::new(vec![
            summary("ext-1", "Tylenol", "acetaminophen", &["50580-488", "50580-496"]),
            summary("ext-2", "Advil", "ibuprofen", &["0573-0164"]),
        ]);
        CatalogService::new(db, Arc::new(lookup))
    }

    fn item(external_id: &str, box_number: i32, quantity: i32) -> CabinetItem {
        CabinetItem {
            external_id: external_id.to_string(),
            box_number,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_upsert_medication_is_idempotent() {
        let (_dir, db) = temp_database();
        let db = Arc::new(db);
        let catalog = service(Arc::clone(&db));

        let first = catalog.upsert_medication("ext-1").await.unwrap();
        let second = catalog.upsert_medication("ext-1").await.unwrap();

        assert_eq!(first.medication.id, second.medication.id);
        assert_eq!(db.medications.count_medications().unwrap(), 1);
        assert_eq!(db.medications.count_ndcs().unwrap(), 2);
        assert_eq!(
            db.medications.get_ndc_codes(first.medication.id).unwrap(),
            vec!["50580-488".to_string(), "50580-496".to_string()]
        );
    }

    #[tokio::test]
    async fn test_upsert_unknown_medication_is_not_found() {
        let (_dir, db) = temp_database();
        let db = Arc::new(db);
        let err = service(Arc::clone(&db)).upsert_medication("missing").await.unwrap_err();
        assert!(matches!(err, CareError::NotFound(_)));
        assert_eq!(db.medications.count_medications().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_with_upstream_down_writes_nothing() {
        let (_dir, db) = temp_database();
        let db = Arc::new(db);
        let catalog = CatalogService::new(Arc::clone(&db), Arc::new(StaticLookup::unavailable()));
        let err = catalog.upsert_medication("ext-1").await.unwrap_err();
        assert!(matches!(err, CareError::UpstreamUnavailable(_)));
        assert_eq!(db.medications.count_medications().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stock_cabinet_writes_medications_before_boxes() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let db = Arc::new(db);
        let catalog = service(Arc::clone(&db));

        let request = StockCabinetRequest {
            medications: vec![item("ext-1", 1, 30), item("ext-2", 2, 14)],
        };
        let boxes = catalog.stock_cabinet(seeded.cabinet.id, &request).await.unwrap();
        assert_eq!(boxes.len(), 2);

        let stored = db.cabinets.get_patient_boxes(seeded.patient.id).unwrap().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|b| b.medication.is_some()));
    }

    #[tokio::test]
    async fn test_stock_cabinet_with_unknown_medication_writes_nothing() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let db = Arc::new(db);
        let catalog = service(Arc::clone(&db));

        let request = StockCabinetRequest {
            medications: vec![item("ext-1", 1, 30), item("missing", 2, 14)],
        };
        let err = catalog.stock_cabinet(seeded.cabinet.id, &request).await.unwrap_err();
        assert!(matches!(err, CareError::NotFound(_)));
        assert_eq!(db.medications.count_medications().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stock_unknown_cabinet_rolls_back() {
        let (_dir, db) = temp_database();
        let db = Arc::new(db);
        let catalog = service(Arc::clone(&db));

        let request = StockCabinetRequest {
            medications: vec![item("ext-1", 1, 30)],
        };
        let err = catalog.stock_cabinet(999, &request).await.unwrap_err();
        assert!(matches!(err, CareError::NotFound(_)));
        assert_eq!(db.medications.count_medications().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stock_cabinet_rejects_negative_quantity() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let catalog = service(Arc::new(db));

        let request = StockCabinetRequest {
            medications: vec![item("ext-1", 1, -3)],
        };
        let err = catalog.stock_cabinet(seeded.cabinet.id, &request).await.unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
    }
}
