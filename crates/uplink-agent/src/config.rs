//! Agent configuration file.
//!
//! TOML with one `[[links]]` table per monitored uplink plus an optional
//! `[collector]` section; everything falls back to defaults.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uplink_common::{CollectorConfig, Link};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Seconds between sampling ticks.
    pub interval_secs: Option<u64>,
    pub collector: CollectorConfig,
    pub links: Vec<Link>,
}

impl AgentConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AgentConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
