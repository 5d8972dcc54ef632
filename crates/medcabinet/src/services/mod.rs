//! Request-scoped workflows over the care database.
//!
//! Each service receives its collaborators (database handle, lookup,
//! notifier) at construction; nothing here reaches for global state.

pub mod catalog;
pub mod schedule;
pub mod session;
pub mod reporting;

pub use catalog::{CabinetItem, CatalogService, StockCabinetRequest, StoredMedication};
pub use reporting::ReportingService;
pub use schedule::ScheduleRecorder;
pub use session::{RecordedSession, SessionRecorder};

use crate::error::{CareError, CareResult};

/// Both identifiers must be present before any write is attempted
pub(crate) fn require_ids(
    patient_id: Option<i64>,
    cabinet_id: Option<i64>,
) -> CareResult<(i64, i64)> {
    match (patient_id, cabinet_id) {
        (Some(patient_id), Some(cabinet_id)) => Ok((patient_id, cabinet_id)),
        (None, _) => Err(CareError::Validation("patient_id is required".into())),
        (_, None) => Err(CareError::Validation("cabinet_id is required".into())),
    }
}
