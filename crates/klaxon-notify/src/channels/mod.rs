pub mod email;
pub mod push;
pub mod sms;
pub mod webhook;

use serde::Deserialize;

use crate::error::NotifyError;
use crate::NotificationChannel;

/// Per-channel provider configuration. Every channel is independently
/// optional; an absent section leaves that channel unconfigured and sends
/// through it fail fast.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSettings {
    #[serde(default)]
    pub email: Option<email::EmailSettings>,
    #[serde(default)]
    pub sms: Option<sms::SmsSettings>,
    #[serde(default)]
    pub webhook: Option<webhook::WebhookSettings>,
    #[serde(default)]
    pub push: Option<push::PushSettings>,
}

/// Instantiates every configured channel.
pub fn build_channels(
    settings: &ChannelSettings,
) -> Result<Vec<Box<dyn NotificationChannel>>, NotifyError> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    if let Some(cfg) = &settings.email {
        channels.push(Box::new(email::EmailChannel::new(cfg)?));
    }
    if let Some(cfg) = &settings.sms {
        channels.push(Box::new(sms::SmsChannel::new(cfg)));
    }
    if let Some(cfg) = &settings.webhook {
        channels.push(Box::new(webhook::WebhookChannel::new(cfg)?));
    }
    if let Some(cfg) = &settings.push {
        channels.push(Box::new(push::PushChannel::new(cfg)));
    }
    Ok(channels)
}

/// Attempts and backoff shared by the built-in channels.
pub(crate) const SEND_ATTEMPTS: u32 = 3;

pub(crate) fn backoff_ms(attempt: u32) -> u64 {
    100 * 2u64.pow(attempt)
}
