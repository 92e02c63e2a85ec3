use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};

use crate::{MessageHandler, MessageTransport, TransportError};

/// In-process transport backed by an unbounded channel.
///
/// Used by tests and the bundled daemon; production deployments plug a
/// queue-backed [`MessageTransport`] implementation in instead.
pub struct LocalTransport {
    tx: mpsc::UnboundedSender<(String, Vec<u8>)>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<(String, Vec<u8>)>>>,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    connected: AtomicBool,
    paused: AtomicBool,
    resume_notify: Notify,
    shutdown: Notify,
}

impl LocalTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            handlers: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    /// Enqueues one message for the topic's subscriber.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.tx
            .send((topic.to_string(), payload))
            .map_err(|e| TransportError::Fatal(e.to_string()))
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for LocalTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.handlers
            .write()
            .await
            .insert(topic.to_string(), handler);
        Ok(())
    }

    async fn run(&self) -> Result<(), TransportError> {
        let mut rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::Fatal("consumer already running".into()))?;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return Ok(()),
                msg = rx.recv() => {
                    let Some((topic, payload)) = msg else {
                        return Ok(());
                    };
                    while self.paused.load(Ordering::SeqCst) {
                        self.resume_notify.notified().await;
                    }
                    let handler = self.handlers.read().await.get(&topic).cloned();
                    match handler {
                        Some(handler) => {
                            if let Err(e) = handler.handle(&payload).await {
                                tracing::error!(topic = %topic, error = %e, "Handler returned error");
                            }
                        }
                        None => {
                            tracing::debug!(topic = %topic, "No subscriber for topic, discarding");
                        }
                    }
                }
            }
        }
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
        Ok(())
    }

    async fn commit(&self) -> Result<(), TransportError> {
        // Delivery is in-process and synchronous; nothing to commit.
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}
