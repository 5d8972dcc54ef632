use prometheus::{Encoder, TextEncoder, Registry, IntCounterVec};
use lazy_static::lazy_static;
use std::sync::OnceLock;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static SESSIONS_RECORDED: OnceLock<IntCounterVec> = OnceLock::new();
static ALERTS: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    match IntCounterVec::new(prometheus::opts!(name, help), labels) {
        Ok(counter) => {
            REGISTRY.register(Box::new(counter.clone())).ok();
            Some(counter)
        }
        Err(e) => {
            warn!("Failed to create metric {}: {}", name, e);
            None
        }
    }
}

pub fn init_metrics() {
    if let Some(c) = counter("requests_total", "Total requests per route", &["route", "status"]) {
        REQ_COUNTER.get_or_init(|| c);
    }
    if let Some(c) = counter("sessions_recorded_total", "Session batches by outcome", &["outcome"]) {
        SESSIONS_RECORDED.get_or_init(|| c);
    }
    if let Some(c) = counter("missed_dose_alerts_total", "Missed-dose alerts by outcome", &["outcome"]) {
        ALERTS.get_or_init(|| c);
    }
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_session(outcome: &str) {
    if let Some(counter) = SESSIONS_RECORDED.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_alert(outcome: &str) {
    if let Some(counter) = ALERTS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_once() {
        init_metrics();
        init_metrics();
        inc_request("/healthz", "200");
        inc_alert("sent");
        inc_session("committed");

        let names: Vec<String> = REGISTRY.gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"requests_total".to_string()));
        assert!(names.contains(&"missed_dose_alerts_total".to_string()));
        assert!(names.contains(&"sessions_recorded_total".to_string()));
    }
}
