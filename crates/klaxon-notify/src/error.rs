use klaxon_common::types::ChannelKind;

/// Errors that can occur within the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No provider is configured for the requested channel kind. Sends
    /// through a disabled channel fail fast rather than hang.
    #[error("Notify: channel '{0}' is not configured")]
    ChannelNotConfigured(ChannelKind),

    /// The recipient string is not valid for the channel (e.g. a
    /// malformed email address).
    #[error("Notify: invalid recipient for {channel}: {reason}")]
    InvalidRecipient {
        channel: ChannelKind,
        reason: String,
    },

    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
