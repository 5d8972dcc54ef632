//! Medication catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::observe;
use crate::care_db::CabinetBox;
use crate::error::CareResult;
use crate::services::{StockCabinetRequest, StoredMedication};
use crate::shared_state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertMedicationRequest {
    pub external_id: String,
}

#[derive(Debug, Serialize)]
pub struct StockCabinetResponse {
    pub cabinet_id: i64,
    pub boxes: Vec<CabinetBox>,
}

/// Search results, or an empty list with 404 when the medication database is
/// unreachable
pub async fn search_medications(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    info!("Medication search: '{}'", params.q);

    match observe("medication_search", state.catalog.search(&params.q).await) {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => {
            warn!("Returning empty search result after upstream failure: {}", e);
            (StatusCode::NOT_FOUND, Json(Vec::<serde_json::Value>::new())).into_response()
        }
    }
}

/// Summary by catalog id; `{}` when the id is unknown upstream
pub async fn get_medication(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Response {
    match observe("medication_get", state.catalog.get_by_id(&external_id).await) {
        Ok(Some(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(None) => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
        Err(e) => {
            let mut response = e.into_response();
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

pub async fn upsert_medication(
    State(state): State<AppState>,
    Json(payload): Json<UpsertMedicationRequest>,
) -> CareResult<Json<StoredMedication>> {
    let stored = observe(
        "medication_upsert",
        state.catalog.upsert_medication(&payload.external_id).await,
    )?;
    Ok(Json(stored))
}

pub async fn stock_cabinet(
    State(state): State<AppState>,
    Path(cabinet_id): Path<i64>,
    Json(payload): Json<StockCabinetRequest>,
) -> CareResult<Json<StockCabinetResponse>> {
    let boxes = observe(
        "cabinet_stock",
        state.catalog.stock_cabinet(cabinet_id, &payload).await,
    )?;
    Ok(Json(StockCabinetResponse { cabinet_id, boxes }))
}
