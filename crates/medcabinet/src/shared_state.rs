//! Application state shared by every HTTP handler.
//!
//! Everything is built once at startup and handed to the router; handlers
//! reach the database and the workflows through these `Arc`s.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::{
    care_db::CareDatabase,
    config::NotificationPolicy,
    lookup::MedicationLookup,
    notifier::{AlertTransport, CaretakerNotifier},
    services::{CatalogService, ReportingService, ScheduleRecorder, SessionRecorder},
};

#[derive(Clone)]
pub struct AppState {
    pub database: Arc<CareDatabase>,
    pub catalog: Arc<CatalogService>,
    pub schedules: Arc<ScheduleRecorder>,
    pub sessions: Arc<SessionRecorder>,
    pub reports: Arc<ReportingService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        policy: NotificationPolicy,
        database: Arc<CareDatabase>,
        lookup: Arc<dyn MedicationLookup>,
        transport: Arc<dyn AlertTransport>,
    ) -> Self {
        let notifier = Arc::new(CaretakerNotifier::new(Arc::clone(&database), transport));
        info!("Session alerts use the {:?} notification policy", policy);

        Self {
            catalog: Arc::new(CatalogService::new(Arc::clone(&database), lookup)),
            schedules: Arc::new(ScheduleRecorder::new(Arc::clone(&database))),
            sessions: Arc::new(SessionRecorder::new(Arc::clone(&database), notifier, policy)),
            reports: Arc::new(ReportingService::new(Arc::clone(&database))),
            database,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
