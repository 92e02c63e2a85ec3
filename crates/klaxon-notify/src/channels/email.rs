use async_trait::async_trait;
use klaxon_common::types::{Alert, ChannelKind};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing;

use super::{backoff_ms, SEND_ATTEMPTS};
use crate::error::NotifyError;
use crate::template::RenderedNotification;
use crate::NotificationChannel;

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(settings: &EmailSettings) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| NotifyError::InvalidConfig(format!("smtp relay: {e}")))?
            .port(settings.smtp_port);

        if let (Some(user), Some(pass)) = (&settings.smtp_username, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: settings.from.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(
        &self,
        _alert: &Alert,
        rendered: &RenderedNotification,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        let from = self
            .from
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("from address: {e}")))?;
        let to = recipient
            .parse()
            .map_err(|e| NotifyError::InvalidRecipient {
                channel: ChannelKind::Email,
                reason: format!("{e}"),
            })?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(&rendered.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(rendered.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        let mut last_err = None;
        for attempt in 0..SEND_ATTEMPTS {
            match self.transport.send(email.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt + 1 < SEND_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms(attempt)))
                            .await;
                    }
                }
            }
        }

        let e = last_err.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(recipient = %recipient, error = %e, "Email send failed after retries");
        Err(NotifyError::Smtp(e))
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }
}
