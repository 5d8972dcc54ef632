//! Caretaker notification on missed doses.
//!
//! `CaretakerNotifier` resolves who to alert from the patient record and hands
//! the address to an `AlertTransport`. Transports never retry.

pub mod smtp;

pub use smtp::SmtpAlertTransport;

use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::care_db::CareDatabase;
use crate::error::CareResult;

pub const ALERT_SUBJECT: &str = "Missed medication intake";
pub const ALERT_BODY: &str = "Your patient has missed their medication intake. Please check on them.";

#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Sends the fixed missed-dose alert. Fails with `CareError::Notification`.
    async fn send_missed_dose_alert(&self, email: &str) -> CareResult<()>;
}

/// Used when no SMTP relay is configured: the alert only reaches the log.
pub struct LogAlertTransport;

#[async_trait]
impl AlertTransport for LogAlertTransport {
    async fn send_missed_dose_alert(&self, email: &str) -> CareResult<()> {
        warn!("SMTP not configured; missed-dose alert for {} logged only", email);
        Ok(())
    }
}

pub struct CaretakerNotifier {
    db: Arc<CareDatabase>,
    transport: Arc<dyn AlertTransport>,
}

impl CaretakerNotifier {
    pub fn new(db: Arc<CareDatabase>, transport: Arc<dyn AlertTransport>) -> Self {
        Self { db, transport }
    }

    /// Email of the patient's caretaker. `NotFound` if the patient or the
    /// caretaker relation is missing.
    pub fn resolve_caretaker_email(&self, conn: &Connection, patient_id: i64) -> CareResult<String> {
        let (_, caretaker) = self.db.patients.get_patient_with_caretaker(conn, patient_id)?;
        Ok(caretaker.email)
    }

    pub async fn notify(&self, email: &str) -> CareResult<()> {
        match self.transport.send_missed_dose_alert(email).await {
            Ok(()) => {
                crate::metrics::inc_alert("sent");
                info!("Missed-dose alert sent to {}", email);
                Ok(())
            }
            Err(e) => {
                crate::metrics::inc_alert("failed");
                warn!("Missed-dose alert to {} failed: {}", email, e);
                Err(e)
            }
        }
    }
}
