//! Liveness and database statistics
use axum::{
    extract::State,
    Json,
};
use serde::Serialize;

use super::observe;
use crate::care_db::DatabaseStats;
use crate::error::CareResult;
use crate::shared_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

pub async fn db_stats(State(state): State<AppState>) -> CareResult<Json<DatabaseStats>> {
    Ok(Json(observe("db_stats", state.database.get_stats())?))
}
