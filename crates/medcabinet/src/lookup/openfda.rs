//! openFDA drug label client.
//!
//! openFDA answers "no matches" with HTTP 404 and a `NOT_FOUND` error body,
//! so a 404 is an empty result here, not a failure.
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{MedicationLookup, MedicationSummary, SEARCH_LIMIT};
use crate::error::{CareError, CareResult};

const LABEL_PATH: &str = "/drug/label.json";

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Option<Vec<LabelResult>>,
}

#[derive(Debug, Deserialize)]
struct LabelResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    openfda: OpenFdaFields,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFdaFields {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
    #[serde(default)]
    product_ndc: Vec<String>,
}

pub struct OpenFdaClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenFdaClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        info!("Medication lookup initialized with backend: {}", base_url);
        Ok(Self {
            base_url,
            api_key,
            http_client,
        })
    }

    fn label_url(&self) -> String {
        format!("{}{}", self.base_url, LABEL_PATH)
    }

    async fn fetch(&self, search: &str, limit: usize) -> CareResult<Vec<MedicationSummary>> {
        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![("search", search), ("limit", limit.as_str())];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("api_key", key));
        }

        let response = self
            .http_client
            .get(self.label_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| CareError::UpstreamUnavailable(format!("Medication lookup request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Medication lookup found no matches for '{}'", search);
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CareError::UpstreamUnavailable(format!(
                "Medication lookup returned {}: {}",
                status, body
            )));
        }

        let parsed: LabelResponse = response
            .json()
            .await
            .map_err(|e| CareError::UpstreamUnavailable(format!("Failed to parse lookup response: {}", e)))?;

        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize)
            .collect())
    }
}

#[async_trait]
impl MedicationLookup for OpenFdaClient {
    async fn search_medications(&self, query: &str) -> CareResult<Vec<MedicationSummary>> {
        let Some(expression) = search_expression(query) else {
            return Ok(Vec::new());
        };

        match self.fetch(&expression, SEARCH_LIMIT).await {
            Ok(results) => {
                debug!("Medication search '{}' returned {} result(s)", query, results.len());
                Ok(results)
            }
            Err(e) => {
                warn!("Medication search '{}' failed: {}", query, e);
                Err(e)
            }
        }
    }

    async fn get_medication_by_id(&self, external_id: &str) -> CareResult<Option<MedicationSummary>> {
        let id = sanitize_term(external_id);
        if id.is_empty() {
            return Ok(None);
        }

        match self.fetch(&format!("id:\"{}\"", id), 1).await {
            Ok(results) => Ok(results.into_iter().next()),
            Err(e) => {
                error!("Medication lookup for id {} failed: {}", external_id, e);
                Err(e)
            }
        }
    }
}

fn sanitize_term(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

/// Space-separated clauses are OR-ed by openFDA
fn search_expression(query: &str) -> Option<String> {
    let term = sanitize_term(query);
    if term.is_empty() {
        return None;
    }
    Some(format!(
        "openfda.brand_name:\"{term}\" openfda.generic_name:\"{term}\" openfda.product_ndc:\"{term}\""
    ))
}

fn normalize(result: LabelResult) -> Option<MedicationSummary> {
    let external_id = result.id.filter(|id| !id.trim().is_empty())?;
    let fields = result.openfda;

    let generic_name = fields.generic_name.into_iter().next().unwrap_or_default();
    let brand_name = fields
        .brand_name
        .into_iter()
        .next()
        .unwrap_or_else(|| generic_name.clone());

    let mut ndc_codes: Vec<String> = Vec::new();
    for code in fields.product_ndc {
        if !ndc_codes.contains(&code) {
            ndc_codes.push(code);
        }
    }

    Some(MedicationSummary {
        external_id,
        brand_name,
        generic_name,
        ndc_codes,
    })
}
