//! API module - HTTP handlers over the care workflows

pub mod medication_api;
pub mod care_api;
pub mod report_api;
pub mod admin_api;

// Re-export API handlers
pub use medication_api::{get_medication, search_medications, stock_cabinet, upsert_medication};
pub use care_api::{caretaker_patients, create_schedules, record_session};
pub use report_api::{alarm_response_time, failure_rate, ingestion_time, patient_medications, patient_schedule};
pub use admin_api::{db_stats, health};

use tracing::error;

use crate::error::CareResult;
use crate::metrics;

/// Counts the outcome under the route label and logs failures server-side
pub(crate) fn observe<T>(route: &str, result: CareResult<T>) -> CareResult<T> {
    match &result {
        Ok(_) => metrics::inc_request(route, "ok"),
        Err(e) => {
            error!("{} failed: {}", route, e);
            metrics::inc_request(route, e.code());
        }
    }
    result
}
