//! Engine configuration stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::retry::RetryPolicy;

/// Engine configuration (TOML).
///
/// Missing fields take the reference defaults, so an empty file is a valid
/// configuration.
///
/// ```toml
/// [retry]
/// attempts = 10
/// delay_ms = 100
/// max_delay_ms = 30000
/// max_jitter_ms = 100
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry budget applied to operations executed with retries enabled.
    pub retry: RetryPolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
