//! HTTP server startup and routing.
//!
//! Handlers share one `AppState`: the care database pool, the medication
//! lookup client and the caretaker notifier are built once here.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    care_db::CareDatabase,
    config::Config,
    lookup::{MedicationLookup, OpenFdaClient},
    notifier::{AlertTransport, LogAlertTransport, SmtpAlertTransport},
    shared_state::AppState,
};

/// Opens the database, wires the collaborators and serves until shutdown
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::metrics::init_metrics();
    cfg.print_config();

    let addr = cfg.api_addr()?;
    let database = Arc::new(CareDatabase::new(&cfg.database_path, cfg.db_pool_size)?);
    info!("Care database ready at: {}", cfg.database_path.display());

    let lookup: Arc<dyn MedicationLookup> = Arc::new(OpenFdaClient::new(
        cfg.openfda_base_url.clone(),
        cfg.openfda_api_key.clone(),
        cfg.lookup_timeout(),
    )?);

    let transport: Arc<dyn AlertTransport> = match &cfg.smtp {
        Some(smtp) => Arc::new(SmtpAlertTransport::new(smtp, &cfg.mail_from, cfg.mail_timeout())?),
        None => {
            warn!("No SMTP relay configured; alerts go to the log only");
            Arc::new(LogAlertTransport)
        }
    };

    let request_timeout = cfg.request_timeout();
    let state = AppState::new(cfg.notification_policy, database, lookup, transport);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = build_router(state, request_timeout);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

pub fn build_router(state: AppState, request_timeout: Duration) -> axum::Router {
    use axum::{
        Router,
        routing::{get, post},
    };
    use tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
        timeout::TimeoutLayer,
    };
    use crate::api;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    Router::new()
        // Medication catalog
        .route("/medications/search", get(api::search_medications))
        .route("/medications/:external_id", get(api::get_medication))
        .route("/medications", post(api::upsert_medication))
        .route("/cabinets/:cabinet_id/medications", post(api::stock_cabinet))
        // Care records
        .route("/schedules", post(api::create_schedules))
        .route("/sessions", post(api::record_session))
        .route("/caretakers/:id/patients", get(api::caretaker_patients))
        // Reports
        .route("/patients/:id/schedule", get(api::patient_schedule))
        .route("/patients/:id/medications", get(api::patient_medications))
        .route("/patients/:id/reports/ingestion-time", get(api::ingestion_time))
        .route("/patients/:id/reports/alarm-response-time", get(api::alarm_response_time))
        .route("/patients/:id/reports/failure-rate", get(api::failure_rate))
        // Operations
        .route("/healthz", get(api::health))
        .route("/admin/stats", get(api::db_stats))
        .route("/metrics", get(crate::metrics::get_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationPolicy;
    use crate::test_support::{seed_patient, summary, temp_database, RecordingTransport, StaticLookup};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with(db: CareDatabase, lookup: StaticLookup, transport: Arc<RecordingTransport>) -> axum::Router {
        let state = AppState::new(NotificationPolicy::Transactional, Arc::new(db), Arc::new(lookup), transport);
        build_router(state, Duration::from_secs(5))
    }

    fn catalog() -> StaticLookup {
        StaticLookup::new(vec![summary("ext-1", "Tylenol", "acetaminophen", &["50580-488"])])
    }

    async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_healthz() {
        let (_dir, db) = temp_database();
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::default()));
        let (status, body) = call(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_search_degrades_to_empty_404_when_upstream_down() {
        let (_dir, db) = temp_database();
        let app = router_with(db, StaticLookup::unavailable(), Arc::new(RecordingTransport::default()));
        let (status, body) = call(&app, "GET", "/medications/search?q=tylenol", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_search_with_no_matches_is_empty_success() {
        let (_dir, db) = temp_database();
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::default()));
        let (status, body) = call(&app, "GET", "/medications/search?q=zzz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_get_medication_shapes() {
        let (_dir, db) = temp_database();
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::default()));

        let (status, body) = call(&app, "GET", "/medications/ext-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["brand_name"], "Tylenol");

        let (status, body) = call(&app, "GET", "/medications/unknown", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_get_medication_upstream_error_is_404_with_code() {
        let (_dir, db) = temp_database();
        let app = router_with(db, StaticLookup::unavailable(), Arc::new(RecordingTransport::default()));
        let (status, body) = call(&app, "GET", "/medications/ext-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_stock_cabinet_then_list_patient_medications() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::default()));

        let (status, body) = call(
            &app,
            "POST",
            &format!("/cabinets/{}/medications", seeded.cabinet.id),
            Some(json!({"medications": [{"external_id": "ext-1", "box": 2, "quantity": 20}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["boxes"].as_array().map(|b| b.len()), Some(1));

        let (status, body) =
            call(&app, "GET", &format!("/patients/{}/medications", seeded.patient.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["box"], 2);
        assert_eq!(body[0]["ndc_codes"], json!(["50580-488"]));
    }

    #[tokio::test]
    async fn test_schedule_without_cabinet_id_is_bad_request() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::default()));

        let (status, body) = call(
            &app,
            "POST",
            "/schedules",
            Some(json!({"patient_id": seeded.patient.id, "schedules": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_session_with_missed_dose_alerts_caretaker() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let transport = Arc::new(RecordingTransport::default());
        let app = router_with(db, catalog(), transport.clone());

        let (status, body) = call(
            &app,
            "POST",
            "/medications",
            Some(json!({"external_id": "ext-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let medication_id = body["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/sessions",
            Some(json!({
                "patient_id": seeded.patient.id,
                "cabinet_id": seeded.cabinet.id,
                "intakes": [{
                    "medication_id": medication_id,
                    "start_time": "2024-05-01T08:00:00Z",
                    "end_time": "2024-05-01T08:30:00Z",
                    "ingested": false
                }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alerts_sent"], 1);
        assert_eq!(transport.sent(), vec!["carer@example.com".to_string()]);

        let (status, body) = call(
            &app,
            "GET",
            &format!("/patients/{}/reports/failure-rate", seeded.patient.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["missed"], 1);
    }

    #[tokio::test]
    async fn test_session_rolls_back_when_alert_fails() {
        let (_dir, db) = temp_database();
        let seeded = seed_patient(&db, "carer@example.com");
        let app = router_with(db, catalog(), Arc::new(RecordingTransport::failing_after(0)));

        let (_, body) = call(&app, "POST", "/medications", Some(json!({"external_id": "ext-1"}))).await;
        let medication_id = body["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/sessions",
            Some(json!({
                "patient_id": seeded.patient.id,
                "cabinet_id": seeded.cabinet.id,
                "intakes": [{
                    "medication_id": medication_id,
                    "start_time": "2024-05-01T08:00:00Z",
                    "end_time": "2024-05-01T08:30:00Z",
                    "ingested": false
                }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "NOTIFICATION_ERROR");

        let (_, stats) = call(&app, "GET", "/admin/stats", None).await;
        assert_eq!(stats["total_sessions"], 0);
        assert_eq!(stats["total_intakes"], 0);
    }
}
