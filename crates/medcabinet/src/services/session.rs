//! Session recording with missed-dose alerts.
//!
//! A session and all of its intakes are written in one transaction. Each
//! intake with `ingested == false` triggers exactly one caretaker alert.
//! The write transaction never spans an alert send, so a slow relay cannot
//! hold the database write lock. Under `NotificationPolicy::Transactional`
//! the caretaker and every referenced row are checked first, the alerts go
//! out next, and the rows are written only once every send succeeded; a
//! failed send leaves nothing behind. Under `AfterCommit` the rows commit
//! first and the alerts are sent best-effort.

use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::require_ids;
use crate::care_db::{CareDatabase, NewIntake, NewSession, Session, SessionIntake};
use crate::config::NotificationPolicy;
use crate::error::{CareError, CareResult};
use crate::notifier::CaretakerNotifier;

#[derive(Debug, Clone, Serialize)]
pub struct RecordedSession {
    pub session: Session,
    pub intakes: Vec<SessionIntake>,
    pub alerts_sent: usize,
}

pub struct SessionRecorder {
    db: Arc<CareDatabase>,
    notifier: Arc<CaretakerNotifier>,
    policy: NotificationPolicy,
}

impl SessionRecorder {
    pub fn new(db: Arc<CareDatabase>, notifier: Arc<CaretakerNotifier>, policy: NotificationPolicy) -> Self {
        Self { db, notifier, policy }
    }

    pub async fn record_session(
        &self,
        cabinet_id: Option<i64>,
        patient_id: Option<i64>,
        payload: &NewSession,
        intakes: &[NewIntake],
    ) -> CareResult<RecordedSession> {
        let (patient_id, cabinet_id) = require_ids(patient_id, cabinet_id)?;

        match self.record_checked(patient_id, cabinet_id, payload, intakes).await {
            Ok(recorded) => {
                crate::metrics::inc_session("committed");
                info!(
                    "Recorded session {} for patient {} with {} intake(s)",
                    recorded.session.id,
                    patient_id,
                    recorded.intakes.len()
                );
                Ok(recorded)
            }
            Err(e) => {
                crate::metrics::inc_session("rolled_back");
                error!("Session for patient {} rolled back: {}", patient_id, e);
                Err(e.into_transaction_failure())
            }
        }
    }

    async fn record_checked(
        &self,
        patient_id: i64,
        cabinet_id: i64,
        payload: &NewSession,
        intakes: &[NewIntake],
    ) -> CareResult<RecordedSession> {
        let missed = intakes.iter().filter(|item| !item.ingested).count();
        let email = {
            let conn = self.db.get_connection()?;
            self.check_references(&conn, patient_id, cabinet_id, intakes, missed)?
        };

        let mut alerts_sent = 0;
        if self.policy == NotificationPolicy::Transactional {
            if let Some(email) = &email {
                for _ in 0..missed {
                    self.notifier.notify(email).await?;
                    alerts_sent += 1;
                }
            }
        }

        let (session, written) = self
            .write_rows(patient_id, cabinet_id, payload, intakes)
            .inspect_err(|e| {
                if alerts_sent > 0 {
                    warn!("{} alert(s) already sent before the write failed: {}", alerts_sent, e);
                }
            })?;

        if self.policy == NotificationPolicy::AfterCommit {
            if let Some(email) = &email {
                for _ in 0..missed {
                    if self.notifier.notify(email).await.is_ok() {
                        alerts_sent += 1;
                    }
                }
            }
        }

        Ok(RecordedSession {
            session,
            intakes: written,
            alerts_sent,
        })
    }

    /// Rejects the batch before any alert or write when a referenced row is
    /// missing. Returns the caretaker's email when there is a missed intake.
    fn check_references(
        &self,
        conn: &Connection,
        patient_id: i64,
        cabinet_id: i64,
        intakes: &[NewIntake],
        missed: usize,
    ) -> CareResult<Option<String>> {
        if self.db.cabinets.get_cabinet_with_conn(conn, cabinet_id)?.is_none() {
            return Err(CareError::TransactionFailure(format!("cabinet {} does not exist", cabinet_id)));
        }
        for item in intakes {
            if !self.db.medications.exists_with_conn(conn, item.medication_id)? {
                return Err(CareError::TransactionFailure(format!(
                    "medication {} does not exist",
                    item.medication_id
                )));
            }
        }

        if missed == 0 {
            return Ok(None);
        }
        let email = self.notifier.resolve_caretaker_email(conn, patient_id)?;
        debug!("{} missed intake(s) for patient {}; alerting {}", missed, patient_id, email);
        Ok(Some(email))
    }

    fn write_rows(
        &self,
        patient_id: i64,
        cabinet_id: i64,
        payload: &NewSession,
        intakes: &[NewIntake],
    ) -> CareResult<(Session, Vec<SessionIntake>)> {
        self.db.with_transaction(|conn| {
            let session = self
                .db
                .sessions
                .insert_session_with_conn(conn, patient_id, cabinet_id, payload)?;
            let written = intakes
                .iter()
                .map(|item| self.db.sessions.insert_intake_with_conn(conn, session.id, item))
                .collect::<CareResult<Vec<SessionIntake>>>()?;
            Ok((session, written))
        })
    }
}
