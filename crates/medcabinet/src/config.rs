// medcabinet/crates/medcabinet/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// What happens to a session write when a missed-dose alert cannot be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPolicy {
    /// Alerts are sent inside the write transaction; a failed alert rolls back
    /// the whole session.
    Transactional,
    /// The session commits first; alerts are sent afterwards and failures are
    /// only logged.
    AfterCommit,
}

impl FromStr for NotificationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transactional" => Ok(NotificationPolicy::Transactional),
            "after_commit" | "after-commit" => Ok(NotificationPolicy::AfterCommit),
            other => Err(anyhow::anyhow!(
                "Unknown NOTIFICATION_POLICY '{}', expected 'transactional' or 'after_commit'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub database_path: PathBuf,
    pub db_pool_size: u32,
    pub openfda_base_url: String,
    pub openfda_api_key: Option<String>,
    pub lookup_timeout_seconds: u64,
    pub smtp: Option<SmtpSettings>,
    pub mail_from: String,
    pub mail_timeout_seconds: u64,
    pub notification_policy: NotificationPolicy,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let smtp = match optional_var("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".into())
                    .parse()
                    .context("SMTP_PORT must be a port number")?,
                username: optional_var("SMTP_USERNAME"),
                password: optional_var("SMTP_PASSWORD"),
                starttls: env::var("SMTP_STARTTLS")
                    .unwrap_or_else(|_| "true".into())
                    .parse()
                    .context("SMTP_STARTTLS must be true or false")?,
            }),
            None => {
                warn!("SMTP_HOST not set; missed-dose alerts will only be logged");
                None
            }
        };

        Ok(Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8000".into()).parse()?,
            database_path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/medcabinet.db".into()),
            ),
            db_pool_size: env::var("DB_POOL_SIZE").unwrap_or_else(|_| "10".into()).parse()?,
            openfda_base_url: env::var("OPENFDA_BASE_URL")
                .unwrap_or_else(|_| "https://api.fda.gov".into()),
            openfda_api_key: optional_var("OPENFDA_API_KEY"),
            lookup_timeout_seconds: env::var("LOOKUP_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            smtp,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "MedCabinet <alerts@medcabinet.local>".into()),
            mail_timeout_seconds: env::var("MAIL_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "15".into())
                .parse()?,
            notification_policy: env::var("NOTIFICATION_POLICY")
                .unwrap_or_else(|_| "transactional".into())
                .parse()?,
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".into())
                .parse()?,
        })
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Database: {} (pool size {})", self.database_path.display(), self.db_pool_size);
        info!("- Medication DB: {}", self.openfda_base_url);
        info!("- Medication DB API key: {}", mask(self.openfda_api_key.as_deref()));
        info!("- Lookup Timeout: {}s", self.lookup_timeout_seconds);
        match &self.smtp {
            Some(smtp) => info!(
                "- SMTP: {}:{} (user: {}, password: {}, starttls: {})",
                smtp.host,
                smtp.port,
                smtp.username.as_deref().unwrap_or("-"),
                mask(smtp.password.as_deref()),
                smtp.starttls
            ),
            None => info!("- SMTP: disabled (log only)"),
        }
        info!("- Mail From: {}", self.mail_from);
        info!("- Mail Timeout: {}s", self.mail_timeout_seconds);
        info!("- Notification Policy: {:?}", self.notification_policy);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }

    pub fn mail_timeout(&self) -> Duration {
        Duration::from_secs(self.mail_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn mask(secret: Option<&str>) -> &'static str {
    match secret {
        Some(_) => "***",
        None => "-",
    }
}
