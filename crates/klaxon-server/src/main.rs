mod config;

use anyhow::Result;
use klaxon_actions::{templates, RecommendationEngine};
use klaxon_common::clock::SystemClock;
use klaxon_dedup::cache::MemoryDedupStore;
use klaxon_dedup::Deduplicator;
use klaxon_engine::controller::AlertController;
use klaxon_engine::sweep::EscalationSweep;
use klaxon_ingest::adapter::IngestionAdapter;
use klaxon_ingest::local::LocalTransport;
use klaxon_ingest::MessageTransport;
use klaxon_notify::channels::build_channels;
use klaxon_notify::dispatcher::Dispatcher;
use klaxon_notify::template::TemplateSet;
use klaxon_policy::PolicyEngine;
use klaxon_store::memory::MemoryAlertStore;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    klaxon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("klaxon=info".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let config = ServerConfig::load(&path)?;
            tracing::info!(path = %path, "Configuration loaded");
            config
        }
        None => {
            tracing::info!("No config file given, using defaults");
            ServerConfig::default()
        }
    };

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryAlertStore::new());
    let dedup = Arc::new(Deduplicator::new(
        config.dedup.rules.clone(),
        Arc::new(MemoryDedupStore::new()),
    ));
    let recommender = Arc::new(RecommendationEngine::new(
        templates::builtin_templates(),
        config.actions.clone(),
        clock.clone(),
    ));
    let policy = Arc::new(PolicyEngine::new(config.escalation.clone()));

    let channels = build_channels(&config.notify.channels)?;
    tracing::info!(
        configured = channels.len(),
        "Notification channels initialized"
    );
    let dispatcher = Arc::new(Dispatcher::new(
        channels,
        TemplateSet::builtin(),
        config.notify.dispatch.clone(),
    ));

    let controller = Arc::new(AlertController::new(
        store.clone(),
        dedup,
        recommender,
        dispatcher.clone(),
        clock.clone(),
        config.engine.clone(),
    ));

    let sweep = Arc::new(EscalationSweep::new(
        store.clone(),
        policy,
        dispatcher,
        clock.clone(),
    ));
    let sweep_handle = tokio::spawn({
        let sweep = sweep.clone();
        async move { sweep.run().await }
    });

    let transport = Arc::new(LocalTransport::new());
    let adapter = Arc::new(IngestionAdapter::new(
        transport.clone(),
        controller.clone(),
        config.ingest.clone(),
    ));
    let ingest_handle = tokio::spawn({
        let adapter = adapter.clone();
        async move {
            if let Err(e) = adapter.start().await {
                tracing::error!(error = %e, "Ingestion adapter stopped");
            }
        }
    });

    tracing::info!("klaxon server started");

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    transport.disconnect().await;
    sweep_handle.abort();
    ingest_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
