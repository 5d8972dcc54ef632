// medcabinet/crates/medcabinet/src/lib.rs

pub mod api;
pub mod care_db;
pub mod config;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod notifier;
pub mod server;
pub mod services;
pub mod shared_state;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

// Public API exports
pub use care_db::CareDatabase;
pub use config::{Config, NotificationPolicy};
pub use error::{CareError, CareResult};
pub use lookup::{MedicationLookup, MedicationSummary, OpenFdaClient};
pub use notifier::{AlertTransport, CaretakerNotifier, LogAlertTransport, SmtpAlertTransport};
pub use server::{build_router, run_server};
pub use shared_state::AppState;
