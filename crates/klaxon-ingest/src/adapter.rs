use klaxon_common::types::{RiskAssessment, SensorHealthEvent};
use klaxon_engine::controller::AlertController;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::{MessageHandler, MessageTransport, TransportError};

/// Retry and reconnect tuning for the inbound feed.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    #[serde(default = "default_risk_topic")]
    pub risk_topic: String,
    #[serde(default = "default_sensor_topic")]
    pub sensor_topic: String,
    /// Attempts per message before it is logged and dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Fixed wait before reconnecting after a fatal consumer fault.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_risk_topic() -> String {
    "risk.assessments".to_string()
}

fn default_sensor_topic() -> String {
    "sensors.health".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            risk_topic: default_risk_topic(),
            sensor_topic: default_sensor_topic(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Wraps a handler in a bounded retry with exponential backoff.
///
/// Exhausting the attempts logs the failure and swallows it — the
/// message is dropped rather than re-raised (no dead-letter queue).
pub struct RetryingHandler {
    inner: Arc<dyn MessageHandler>,
    topic: String,
    max_attempts: u32,
    base_delay_ms: u64,
}

impl RetryingHandler {
    pub fn new(
        inner: Arc<dyn MessageHandler>,
        topic: &str,
        max_attempts: u32,
        base_delay_ms: u64,
    ) -> Self {
        Self {
            inner,
            topic: topic.to_string(),
            max_attempts,
            base_delay_ms,
        }
    }
}

#[async_trait::async_trait]
impl MessageHandler for RetryingHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let mut delay_ms = self.base_delay_ms;
        for attempt in 1..=self.max_attempts {
            match self.inner.handle(payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        topic = %self.topic,
                        attempt,
                        error = %e,
                        "Message handling failed, retrying"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        topic = %self.topic,
                        attempts = self.max_attempts,
                        error = %e,
                        "Message handling failed after retries, dropping message"
                    );
                }
            }
        }
        Ok(())
    }
}

struct RiskAssessmentHandler {
    controller: Arc<AlertController>,
}

#[async_trait::async_trait]
impl MessageHandler for RiskAssessmentHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let assessment: RiskAssessment = serde_json::from_slice(payload)?;
        self.controller.process_risk_assessment(assessment).await?;
        Ok(())
    }
}

struct SensorEventHandler {
    controller: Arc<AlertController>,
}

#[async_trait::async_trait]
impl MessageHandler for SensorEventHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let event: SensorHealthEvent = serde_json::from_slice(payload)?;
        self.controller.process_sensor_event(event).await?;
        Ok(())
    }
}

/// Consumes the two inbound topics and feeds the lifecycle controller.
pub struct IngestionAdapter {
    transport: Arc<dyn MessageTransport>,
    controller: Arc<AlertController>,
    settings: IngestSettings,
    connected: AtomicBool,
}

impl IngestionAdapter {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        controller: Arc<AlertController>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            transport,
            controller,
            settings,
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connects, subscribes both topics and consumes until the transport
    /// stops cleanly. A fatal consumer fault marks the adapter
    /// disconnected, waits the configured delay, then reconnects and
    /// re-subscribes every topic before resuming.
    pub async fn start(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        self.subscribe_topics().await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(
            risk_topic = %self.settings.risk_topic,
            sensor_topic = %self.settings.sensor_topic,
            "Ingestion adapter consuming"
        );

        loop {
            match self.transport.run().await {
                Ok(()) => {
                    self.connected.store(false, Ordering::SeqCst);
                    tracing::info!("Ingestion transport stopped");
                    return Ok(());
                }
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    tracing::error!(error = %e, "Ingestion transport fault, reconnecting");
                    sleep(Duration::from_millis(self.settings.reconnect_delay_ms)).await;
                    self.reconnect().await;
                    self.connected.store(true, Ordering::SeqCst);
                    tracing::info!("Ingestion transport reconnected");
                }
            }
        }
    }

    async fn reconnect(&self) {
        loop {
            let result = async {
                self.transport.connect().await?;
                self.subscribe_topics().await
            }
            .await;
            match result {
                Ok(()) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Reconnect failed, retrying");
                    sleep(Duration::from_millis(self.settings.reconnect_delay_ms)).await;
                }
            }
        }
    }

    async fn subscribe_topics(&self) -> Result<(), TransportError> {
        let risk = RetryingHandler::new(
            Arc::new(RiskAssessmentHandler {
                controller: self.controller.clone(),
            }),
            &self.settings.risk_topic,
            self.settings.max_attempts,
            self.settings.base_delay_ms,
        );
        self.transport
            .subscribe(&self.settings.risk_topic, Arc::new(risk))
            .await?;

        let sensor = RetryingHandler::new(
            Arc::new(SensorEventHandler {
                controller: self.controller.clone(),
            }),
            &self.settings.sensor_topic,
            self.settings.max_attempts,
            self.settings.base_delay_ms,
        );
        self.transport
            .subscribe(&self.settings.sensor_topic, Arc::new(sensor))
            .await?;
        Ok(())
    }
}
