use async_trait::async_trait;
use klaxon_common::types::{Alert, ChannelKind};
use serde::Deserialize;
use tracing;

use super::{backoff_ms, SEND_ATTEMPTS};
use crate::error::NotifyError;
use crate::template::RenderedNotification;
use crate::NotificationChannel;

#[derive(Debug, Clone, Deserialize)]
pub struct SmsSettings {
    pub gateway_url: String,
    pub api_key: String,
    /// Sender number or alphanumeric ID passed to the gateway.
    pub from: String,
}

pub struct SmsChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
    from: String,
}

impl SmsChannel {
    pub fn new(settings: &SmsSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: settings.gateway_url.clone(),
            api_key: settings.api_key.clone(),
            from: settings.from.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    async fn send(
        &self,
        _alert: &Alert,
        rendered: &RenderedNotification,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        // SMS carries the subject line only; bodies exceed gateway limits
        let payload = serde_json::json!({
            "to": recipient,
            "from": self.from,
            "body": rendered.subject,
        });

        let mut last_err: Option<NotifyError> = None;
        for attempt in 0..SEND_ATTEMPTS {
            match self
                .client
                .post(&self.gateway_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        status = %status,
                        "SMS gateway returned error, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "sms-gateway".into(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "SMS send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < SEND_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms(attempt))).await;
            }
        }

        let err = last_err.unwrap_or(NotifyError::Api {
            service: "sms-gateway".into(),
            status: 0,
            body: String::new(),
        });
        tracing::error!(recipient = %recipient, error = %err, "SMS failed after retries");
        Err(err)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }
}
