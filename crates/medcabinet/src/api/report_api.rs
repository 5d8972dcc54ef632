//! Patient report endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use super::observe;
use crate::error::CareResult;
use crate::services::reporting::{
    AlarmResponseTime, CabinetMedication, FailureRate, IngestionTime, ScheduleGroup,
};
use crate::shared_state::AppState;

pub async fn patient_schedule(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> CareResult<Json<Vec<ScheduleGroup>>> {
    let groups = observe(
        "patient_schedule",
        state.reports.patient_medication_schedule(patient_id),
    )?;
    Ok(Json(groups))
}

pub async fn patient_medications(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> CareResult<Json<Vec<CabinetMedication>>> {
    let medications = observe("patient_medications", state.reports.patient_medications(patient_id))?;
    Ok(Json(medications))
}

pub async fn ingestion_time(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> CareResult<Json<Vec<IngestionTime>>> {
    Ok(Json(observe("report_ingestion_time", state.reports.ingestion_time(patient_id))?))
}

pub async fn alarm_response_time(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> CareResult<Json<Vec<AlarmResponseTime>>> {
    Ok(Json(observe(
        "report_alarm_response_time",
        state.reports.alarm_response_time(patient_id),
    )?))
}

pub async fn failure_rate(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> CareResult<Json<Vec<FailureRate>>> {
    Ok(Json(observe("report_failure_rate", state.reports.failure_rate(patient_id))?))
}
