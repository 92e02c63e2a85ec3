//! Notification delivery for klaxon alerts.
//!
//! Rendered notifications fan out across up to four channel kinds (SMS,
//! email, webhook, push) according to a severity-keyed [`dispatcher::FanoutPolicy`].
//! Each channel is independently optional at startup; sends through an
//! unconfigured kind fail fast with [`error::NotifyError::ChannelNotConfigured`]
//! instead of hanging. Every (recipient, channel) pair is attempted
//! independently — one failure never blocks the rest of the fan-out.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod template;


use async_trait::async_trait;
use klaxon_common::types::{Alert, ChannelKind, Severity};

use error::NotifyError;
use template::RenderedNotification;

/// Priority hint passed to channel transports, derived from severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPriority {
    Normal,
    High,
    Urgent,
}

impl DispatchPriority {
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Emergency => DispatchPriority::Urgent,
            Severity::Critical => DispatchPriority::High,
            _ => DispatchPriority::Normal,
        }
    }
}

impl std::fmt::Display for DispatchPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchPriority::Normal => write!(f, "normal"),
            DispatchPriority::High => write!(f, "high"),
            DispatchPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// A notification delivery channel that sends a rendered alert
/// notification to one recipient through an external transport.
///
/// Implementations retry transient transport failures internally (three
/// attempts with doubling backoff) and return the final outcome.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the rendered notification to one recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after the channel's retries.
    async fn send(
        &self,
        alert: &Alert,
        rendered: &RenderedNotification,
        recipient: &str,
    ) -> Result<(), NotifyError>;

    /// The channel kind this implementation serves.
    fn kind(&self) -> ChannelKind;
}
