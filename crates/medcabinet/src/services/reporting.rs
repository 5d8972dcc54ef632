//! Read-only patient reports.
//!
//! Every report follows the same shape: fetch rows for the patient, bucket
//! them by a typed key in first-seen order, then summarize each bucket.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::care_db::{CabinetBoxRow, CareDatabase, IntakeRow, PatientScheduleRow, Schedule};
use crate::error::CareResult;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleGroup {
    pub brand_name: String,
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CabinetMedication {
    pub ndc_codes: Vec<String>,
    pub brand_name: String,
    pub generic_name: String,
    #[serde(rename = "box")]
    pub box_number: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestionTime {
    pub medication_id: i64,
    pub brand_name: String,
    pub generic_name: String,
    pub average_ingestion_time: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlarmResponseTime {
    pub medication_id: i64,
    pub brand_name: String,
    pub generic_name: String,
    pub average_response_minutes: f64,
    pub responses: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureRate {
    pub medication_id: i64,
    pub brand_name: String,
    pub generic_name: String,
    pub missed: usize,
    pub total: usize,
    pub failure_rate: f64,
}

pub struct ReportingService {
    db: Arc<CareDatabase>,
}

impl ReportingService {
    pub fn new(db: Arc<CareDatabase>) -> Self {
        Self { db }
    }

    pub fn patient_medication_schedule(&self, patient_id: i64) -> CareResult<Vec<ScheduleGroup>> {
        let rows = self.db.schedules.get_patient_schedules(patient_id)?;
        Ok(group_schedules(rows))
    }

    /// Empty when the patient has no cabinet
    pub fn patient_medications(&self, patient_id: i64) -> CareResult<Vec<CabinetMedication>> {
        let boxes = self.db.cabinets.get_patient_boxes(patient_id)?.unwrap_or_default();
        Ok(cabinet_medications(boxes))
    }

    pub fn ingestion_time(&self, patient_id: i64) -> CareResult<Vec<IngestionTime>> {
        let rows = self.db.sessions.get_patient_intakes(patient_id)?;
        Ok(average_ingestion_times(rows))
    }

    pub fn alarm_response_time(&self, patient_id: i64) -> CareResult<Vec<AlarmResponseTime>> {
        let rows = self.db.sessions.get_patient_intakes(patient_id)?;
        Ok(average_response_times(rows))
    }

    pub fn failure_rate(&self, patient_id: i64) -> CareResult<Vec<FailureRate>> {
        let rows = self.db.sessions.get_patient_intakes(patient_id)?;
        Ok(failure_rates(rows))
    }
}

/// Buckets items by key, keeping buckets and their members in input order
fn bucket_by<K, T, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => buckets[i].1.push(item),
            None => {
                index.insert(k.clone(), buckets.len());
                buckets.push((k, vec![item]));
            }
        }
    }
    buckets
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 60.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn group_schedules(rows: Vec<PatientScheduleRow>) -> Vec<ScheduleGroup> {
    bucket_by(rows, |row| row.brand_name.clone())
        .into_iter()
        .map(|(brand_name, rows)| ScheduleGroup {
            brand_name,
            schedules: rows.into_iter().map(|row| row.schedule).collect(),
        })
        .collect()
}

fn cabinet_medications(boxes: Vec<CabinetBoxRow>) -> Vec<CabinetMedication> {
    boxes
        .into_iter()
        .filter_map(|row| {
            let medication = row.medication?;
            Some(CabinetMedication {
                ndc_codes: row.ndc_codes,
                brand_name: medication.brand_name,
                generic_name: medication.generic_name,
                box_number: row.cabinet_box.box_number,
                quantity: row.cabinet_box.quantity,
            })
        })
        .collect()
}

fn average_ingestion_times(rows: Vec<IntakeRow>) -> Vec<IngestionTime> {
    bucket_by(rows, |row| row.intake.medication_id)
        .into_iter()
        .map(|(medication_id, rows)| {
            let minutes: Vec<f64> = rows
                .iter()
                .map(|row| minutes_between(row.intake.start_time, row.intake.end_time))
                .collect();
            IngestionTime {
                medication_id,
                brand_name: rows[0].brand_name.clone(),
                generic_name: rows[0].generic_name.clone(),
                average_ingestion_time: mean(&minutes),
            }
        })
        .collect()
}

fn average_response_times(rows: Vec<IntakeRow>) -> Vec<AlarmResponseTime> {
    let responded = rows
        .into_iter()
        .filter(|row| row.intake.ingested && row.intake.ingest_time.is_some());

    bucket_by(responded, |row| row.intake.medication_id)
        .into_iter()
        .map(|(medication_id, rows)| {
            let minutes: Vec<f64> = rows
                .iter()
                .filter_map(|row| {
                    row.intake
                        .ingest_time
                        .map(|ingested_at| minutes_between(row.intake.start_time, ingested_at))
                })
                .collect();
            AlarmResponseTime {
                medication_id,
                brand_name: rows[0].brand_name.clone(),
                generic_name: rows[0].generic_name.clone(),
                average_response_minutes: mean(&minutes),
                responses: minutes.len(),
            }
        })
        .collect()
}

fn failure_rates(rows: Vec<IntakeRow>) -> Vec<FailureRate> {
    bucket_by(rows, |row| row.intake.medication_id)
        .into_iter()
        .map(|(medication_id, rows)| {
            let total = rows.len();
            let missed = rows.iter().filter(|row| !row.intake.ingested).count();
            FailureRate {
                medication_id,
                brand_name: rows[0].brand_name.clone(),
                generic_name: rows[0].generic_name.clone(),
                missed,
                total,
                failure_rate: missed as f64 / total as f64,
            }
        })
        .collect()
}
