//! Row types for the care database
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CareResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Caretaker {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub caretaker_id: i64,
}

/// Local mirror of an external catalog entry, keyed by `external_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: i64,
    pub external_id: String,
    pub brand_name: String,
    pub generic_name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cabinet {
    pub id: i64,
    pub patient_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CabinetBox {
    pub id: i64,
    pub cabinet_id: i64,
    pub medication_id: i64,
    #[serde(rename = "box")]
    pub box_number: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: i64,
    pub patient_id: i64,
    pub medication_id: i64,
    pub day: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: i64,
    pub patient_id: i64,
    pub cabinet_id: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionIntake {
    pub id: i64,
    pub session_id: i64,
    pub medication_id: i64,
    pub start_time: DateTime<Utc>,
    pub ingest_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub ingested: bool,
}

/// One planned dose as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewSchedule {
    pub medication_id: i64,
    #[validate(length(min = 1))]
    pub day: String,
    #[validate(length(min = 1))]
    pub time: String,
}

/// Session header as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewSession {
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// One observed or expected dose event as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIntake {
    pub medication_id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub ingest_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub ingested: bool,
}

/// Schedule joined with its medication, for the grouped schedule view
#[derive(Debug, Clone)]
pub struct PatientScheduleRow {
    pub schedule: Schedule,
    pub brand_name: String,
    pub generic_name: String,
}

/// Cabinet slot with its medication resolved, if any
#[derive(Debug, Clone)]
pub struct CabinetBoxRow {
    pub cabinet_box: CabinetBox,
    pub medication: Option<Medication>,
    pub ndc_codes: Vec<String>,
}

/// Intake joined with its medication names
#[derive(Debug, Clone)]
pub struct IntakeRow {
    pub intake: SessionIntake,
    pub brand_name: String,
    pub generic_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_patients: i64,
    pub total_medications: i64,
    pub total_schedules: i64,
    pub total_sessions: i64,
    pub total_intakes: i64,
}

pub(crate) fn parse_timestamp(raw: &str) -> CareResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> CareResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}
