use async_trait::async_trait;
use klaxon_common::types::{Alert, ChannelKind};
use serde::Deserialize;
use tracing;

use super::{backoff_ms, SEND_ATTEMPTS};
use crate::error::NotifyError;
use crate::template::RenderedNotification;
use crate::NotificationChannel;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    /// Request timeout for each delivery attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// POSTs a JSON payload to the recipient URL. The recipient string for
/// this channel is the webhook endpoint itself.
pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(settings: &WebhookSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(NotifyError::Http)?;
        Ok(Self { client })
    }

    fn payload(alert: &Alert, rendered: &RenderedNotification) -> serde_json::Value {
        serde_json::json!({
            "alert_id": alert.id,
            "category": alert.category.as_str(),
            "severity": alert.severity.to_string(),
            "state": alert.state.to_string(),
            "priority": rendered.priority,
            "subject": rendered.subject,
            "body": rendered.body,
            "source_id": alert.source_id,
            "location": alert.location,
            "triggered_at": alert.triggered_at.to_rfc3339(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(
        &self,
        alert: &Alert,
        rendered: &RenderedNotification,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        let payload = Self::payload(alert, rendered);

        let mut last_err: Option<NotifyError> = None;
        for attempt in 0..SEND_ATTEMPTS {
            match self.client.post(recipient).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %recipient,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "webhook".into(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %recipient,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < SEND_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms(attempt))).await;
            }
        }

        let err = last_err.unwrap_or(NotifyError::Api {
            service: "webhook".into(),
            status: 0,
            body: String::new(),
        });
        tracing::error!(url = %recipient, error = %err, "Webhook failed after retries");
        Err(err)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }
}
