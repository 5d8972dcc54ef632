//! Medication lookup against the external drug database.
//!
//! Everything past this module sees only `MedicationSummary`; the upstream
//! response shape never leaks out.

pub mod openfda;

pub use openfda::OpenFdaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CareResult;

/// Search results are capped at this many entries
pub const SEARCH_LIMIT: usize = 10;

/// Normalized view of one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationSummary {
    pub external_id: String,
    pub brand_name: String,
    pub generic_name: String,
    pub ndc_codes: Vec<String>,
}

#[async_trait]
pub trait MedicationLookup: Send + Sync {
    /// OR-match over brand name, generic name and product code.
    /// No upstream matches is `Ok(vec![])`; a failed call is `UpstreamUnavailable`.
    async fn search_medications(&self, query: &str) -> CareResult<Vec<MedicationSummary>>;

    /// Exact match on the catalog id. `Ok(None)` when nothing matches.
    async fn get_medication_by_id(&self, external_id: &str) -> CareResult<Option<MedicationSummary>>;
}
