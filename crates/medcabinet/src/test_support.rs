//! Shared fixtures for unit tests
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

use crate::care_db::{Cabinet, CareDatabase, Caretaker, Medication, Patient};
use crate::error::{CareError, CareResult};
use crate::lookup::{MedicationLookup, MedicationSummary};
use crate::notifier::AlertTransport;

/// File-backed database so pooled reads can run next to an open transaction
pub fn temp_database() -> (TempDir, CareDatabase) {
    let dir = TempDir::new().unwrap();
    let db = CareDatabase::new(&dir.path().join("care.db"), 4).unwrap();
    (dir, db)
}

pub fn summary(external_id: &str, brand: &str, generic: &str, codes: &[&str]) -> MedicationSummary {
    MedicationSummary {
        external_id: external_id.to_string(),
        brand_name: brand.to_string(),
        generic_name: generic.to_string(),
        ndc_codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

pub struct SeededPatient {
    pub caretaker: Caretaker,
    pub patient: Patient,
    pub cabinet: Cabinet,
}

/// Caretaker with one patient who owns one cabinet
pub fn seed_patient(db: &CareDatabase, email: &str) -> SeededPatient {
    db.with_transaction(|conn| {
        let caretaker = db.patients.create_caretaker_with_conn(conn, "Ana Carer", email)?;
        let patient = db
            .patients
            .create_patient_with_conn(conn, "Bo", "Patient", Some("1941-03-02"), caretaker.id)?;
        let cabinet = db.cabinets.create_cabinet_with_conn(conn, patient.id)?;
        Ok(SeededPatient {
            caretaker,
            patient,
            cabinet,
        })
    })
    .unwrap()
}

pub fn insert_medication(db: &CareDatabase, external_id: &str, brand: &str) -> Medication {
    let entry = summary(external_id, brand, &brand.to_lowercase(), &[]);
    db.with_transaction(|conn| db.medications.upsert_with_conn(conn, &entry))
        .unwrap()
}

/// In-memory catalog keyed by external id
pub struct StaticLookup {
    entries: HashMap<String, MedicationSummary>,
    available: bool,
}

impl StaticLookup {
    pub fn new(entries: Vec<MedicationSummary>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.external_id.clone(), e)).collect(),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            available: false,
        }
    }

    fn check(&self) -> CareResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(CareError::UpstreamUnavailable("connection refused".into()))
        }
    }
}

#[async_trait]
impl MedicationLookup for StaticLookup {
    async fn search_medications(&self, query: &str) -> CareResult<Vec<MedicationSummary>> {
        self.check()?;
        let needle = query.to_lowercase();
        let mut found: Vec<MedicationSummary> = self
            .entries
            .values()
            .filter(|e| {
                e.brand_name.to_lowercase().contains(&needle)
                    || e.generic_name.to_lowercase().contains(&needle)
                    || e.ndc_codes.iter().any(|c| c == query)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(found)
    }

    async fn get_medication_by_id(&self, external_id: &str) -> CareResult<Option<MedicationSummary>> {
        self.check()?;
        Ok(self.entries.get(external_id).cloned())
    }
}

/// Records every delivered alert; can be told to start failing after N sends
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    fail_after: Option<usize>,
}

impl RecordingTransport {
    pub fn failing_after(successes: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_after: Some(successes),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn send_missed_dose_alert(&self, email: &str) -> CareResult<()> {
        let mut sent = self.sent.lock().unwrap();
        if matches!(self.fail_after, Some(limit) if sent.len() >= limit) {
            return Err(CareError::Notification("relay rejected message".into()));
        }
        sent.push(email.to_string());
        Ok(())
    }
}

/// Waits before every send, like a sluggish SMTP relay
pub struct SlowTransport {
    delay: std::time::Duration,
    inner: RecordingTransport,
}

impl SlowTransport {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            inner: RecordingTransport::default(),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.sent()
    }
}

#[async_trait]
impl AlertTransport for SlowTransport {
    async fn send_missed_dose_alert(&self, email: &str) -> CareResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.send_missed_dose_alert(email).await
    }
}
