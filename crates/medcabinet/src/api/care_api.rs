//! Patient care endpoints: schedules, sessions and caretaker rosters

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::observe;
use crate::care_db::{NewIntake, NewSchedule, NewSession, Patient};
use crate::error::CareResult;
use crate::services::RecordedSession;
use crate::shared_state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSchedulesRequest {
    pub patient_id: Option<i64>,
    pub cabinet_id: Option<i64>,
    #[serde(default)]
    pub schedules: Vec<NewSchedule>,
}

#[derive(Debug, Serialize)]
pub struct CreateSchedulesResponse {
    pub created: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    pub patient_id: Option<i64>,
    pub cabinet_id: Option<i64>,
    #[serde(default)]
    pub session: NewSession,
    #[serde(default)]
    pub intakes: Vec<NewIntake>,
}

#[derive(Debug, Serialize)]
pub struct RecordSessionResponse {
    pub session_id: i64,
    pub intakes: usize,
    pub alerts_sent: usize,
}

impl From<RecordedSession> for RecordSessionResponse {
    fn from(recorded: RecordedSession) -> Self {
        Self {
            session_id: recorded.session.id,
            intakes: recorded.intakes.len(),
            alerts_sent: recorded.alerts_sent,
        }
    }
}

pub async fn create_schedules(
    State(state): State<AppState>,
    Json(payload): Json<CreateSchedulesRequest>,
) -> CareResult<Json<CreateSchedulesResponse>> {
    info!("Creating {} schedule(s) for patient {:?}", payload.schedules.len(), payload.patient_id);

    let created = observe(
        "schedules_create",
        state
            .schedules
            .create_schedules(payload.patient_id, payload.cabinet_id, &payload.schedules),
    )?;
    Ok(Json(CreateSchedulesResponse { created }))
}

pub async fn record_session(
    State(state): State<AppState>,
    Json(payload): Json<RecordSessionRequest>,
) -> CareResult<Json<RecordSessionResponse>> {
    info!("Recording session with {} intake(s) for patient {:?}", payload.intakes.len(), payload.patient_id);

    let recorded = observe(
        "session_record",
        state
            .sessions
            .record_session(payload.cabinet_id, payload.patient_id, &payload.session, &payload.intakes)
            .await,
    )?;
    Ok(Json(recorded.into()))
}

pub async fn caretaker_patients(
    State(state): State<AppState>,
    Path(caretaker_id): Path<i64>,
) -> CareResult<Json<Vec<Patient>>> {
    let patients = observe(
        "caretaker_patients",
        state.database.patients.get_caretaker_patients(caretaker_id),
    )?;
    Ok(Json(patients))
}
