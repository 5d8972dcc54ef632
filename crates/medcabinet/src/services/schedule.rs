//! Planned-dose recording
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use super::require_ids;
use crate::care_db::{CareDatabase, NewSchedule, Schedule};
use crate::error::CareResult;

pub struct ScheduleRecorder {
    db: Arc<CareDatabase>,
}

impl ScheduleRecorder {
    pub fn new(db: Arc<CareDatabase>) -> Self {
        Self { db }
    }

    /// Inserts every item for the patient in one transaction and returns the
    /// number of rows written. The cabinet id is required by the request
    /// contract but not stored on the schedule.
    pub fn create_schedules(
        &self,
        patient_id: Option<i64>,
        cabinet_id: Option<i64>,
        items: &[NewSchedule],
    ) -> CareResult<usize> {
        let (patient_id, _cabinet_id) = require_ids(patient_id, cabinet_id)?;
        for item in items {
            item.validate()?;
        }

        let result = self.db.with_transaction(|conn| {
            items
                .iter()
                .map(|item| self.db.schedules.insert_with_conn(conn, patient_id, item))
                .collect::<CareResult<Vec<Schedule>>>()
        });

        match result {
            Ok(created) => {
                info!("Created {} schedule(s) for patient {}", created.len(), patient_id);
                Ok(created.len())
            }
            Err(e) => {
                error!("Failed to create schedules for patient {}: {}", patient_id, e);
                Err(e.into_transaction_failure())
            }
        }
    }
}
