//! SMTP alert transport
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

use super::{AlertTransport, ALERT_BODY, ALERT_SUBJECT};
use crate::config::SmtpSettings;
use crate::error::{CareError, CareResult};

pub struct SmtpAlertTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpAlertTransport {
    pub fn new(settings: &SmtpSettings, mail_from: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder.port(settings.port).timeout(Some(timeout));

        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from: Mailbox = mail_from
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid MAIL_FROM '{}': {}", mail_from, e))?;

        info!("SMTP alert transport configured for {}:{}", settings.host, settings.port);
        Ok(Self {
            mailer: builder.build(),
            from,
            timeout,
        })
    }

    fn build_message(&self, email: &str) -> CareResult<Message> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| CareError::Notification(format!("Invalid caretaker address '{}': {}", email, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(ALERT_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(ALERT_BODY.to_string())
            .map_err(|e| CareError::Notification(format!("Failed to build alert message: {}", e)))
    }
}

#[async_trait]
impl AlertTransport for SmtpAlertTransport {
    async fn send_missed_dose_alert(&self, email: &str) -> CareResult<()> {
        let message = self.build_message(email)?;
        debug!("Sending missed-dose alert to {}", email);

        match tokio::time::timeout(self.timeout, self.mailer.send(message)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CareError::Notification(format!("SMTP send failed: {}", e))),
            Err(_) => Err(CareError::Notification(format!(
                "SMTP send timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            starttls: false,
        }
    }

    #[tokio::test]
    async fn test_builds_plain_text_alert() {
        let transport =
            SmtpAlertTransport::new(&settings(), "MedCabinet <alerts@medcabinet.local>", Duration::from_secs(1)).unwrap();
        let message = transport.build_message("carer@example.com").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Missed medication intake"));
        assert!(raw.contains("To: carer@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_notification_error() {
        let transport =
            SmtpAlertTransport::new(&settings(), "alerts@medcabinet.local", Duration::from_secs(1)).unwrap();
        let err = transport.send_missed_dose_alert("not an address").await.unwrap_err();
        assert!(matches!(err, CareError::Notification(_)));
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        assert!(SmtpAlertTransport::new(&settings(), "nope", Duration::from_secs(1)).is_err());
    }
}
