use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_analysis_timeout_ms() -> u64 { 5_000 }
fn default_true() -> bool { true }
fn default_history_terms() -> u32 { 12 }
fn default_fixture_seed() -> u64 { 42 }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on a single narrative analysis call.
    #[serde(default = "default_analysis_timeout_ms")]
    pub analysis_timeout_ms: u64,
    /// When false, completed snapshots get no analysis attached.
    #[serde(default = "default_true")]
    pub analysis_enabled: bool,
    /// Historical observations generated per baseline by the fixture import.
    #[serde(default = "default_history_terms")]
    pub history_terms: u32,
    #[serde(default = "default_fixture_seed")]
    pub fixture_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_ms: default_analysis_timeout_ms(),
            analysis_enabled:    true,
            history_terms:       default_history_terms(),
            fixture_seed:        default_fixture_seed(),
        }
    }
}

impl EngineConfig {
    /// Load from `{data_dir}/engine.json`. A missing file means defaults.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine.json");
        if !std::path::Path::new(&path).exists() {
            log::info!("{path} not found; using default engine config");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    pub fn default_test() -> Self {
        Self {
            analysis_timeout_ms: 500,
            analysis_enabled:    true,
            history_terms:       12,
            fixture_seed:        0x5EED,
        }
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }
}
