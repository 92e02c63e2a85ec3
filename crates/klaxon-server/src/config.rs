use klaxon_actions::CostModel;
use klaxon_common::types::AlertCategory;
use klaxon_dedup::DedupRule;
use klaxon_engine::controller::EngineSettings;
use klaxon_ingest::adapter::IngestSettings;
use klaxon_notify::channels::ChannelSettings;
use klaxon_notify::dispatcher::DispatchSettings;
use klaxon_policy::EscalationSettings;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub escalation: EscalationSettings,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub actions: CostModel,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DedupConfig {
    /// Per-category deduplication rules; a category without a rule is
    /// never deduplicated.
    #[serde(default)]
    pub rules: HashMap<AlertCategory, DedupRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub channels: ChannelSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
