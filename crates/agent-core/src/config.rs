use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Tunables for one agent session. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Session ends once this many actions were emitted.
    pub max_actions: u32,
    /// Identical consecutive goals that count as "bored".
    pub boredom_threshold: usize,
    /// Consecutive no-op plan steps before plans are abandoned for exploration.
    pub frustration_threshold: u32,
    /// Events handed to the strategy call.
    pub recent_window: usize,
    /// Click coordinates are drawn from `0..grid_size`.
    pub grid_size: u8,
    pub reasoning_timeout_ms: u64,
    pub enable_repair: bool,
    /// Run one reasoning pass over the first screen before the initial reset.
    pub visual_analysis: bool,
    pub brain_dir: PathBuf,
    pub rng_seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_actions: 150,
            boredom_threshold: 3,
            frustration_threshold: 3,
            recent_window: 5,
            grid_size: 64,
            reasoning_timeout_ms: 30_000,
            enable_repair: true,
            visual_analysis: false,
            brain_dir: PathBuf::from("agent_brains"),
            rng_seed: None,
        }
    }
}

impl AgentConfig {
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_timeout_ms)
    }
}

/// TOML config loader.
///
/// Search order:
/// 1) `GRID_AGENT_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
/// 3) `<workspace_root>/config/<relative_path>`
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn parse_from_file<T: DeserializeOwned>(relative_path: &str) -> anyhow::Result<T> {
        let path = Self::resolve_path(relative_path)?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_str(&text)
    }

    pub fn parse_from_str<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).context("Failed to parse TOML")
    }

    fn resolve_path(relative_path: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(relative_path);
        if rel.is_absolute() && rel.is_file() {
            return Ok(rel.to_path_buf());
        }

        if let Some(root) = env::var_os("GRID_AGENT_CONFIG_DIR") {
            let candidate = PathBuf::from(root).join(rel);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            let candidate = cwd.join(rel);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        // This crate lives at <workspace_root>/crates/agent-core.
        let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)
            .ok_or_else(|| anyhow::anyhow!("CARGO_MANIFEST_DIR has insufficient ancestors"))?
            .join("config")
            .join(rel);
        if candidate.is_file() {
            return Ok(candidate);
        }

        anyhow::bail!("Config file not found for {:?}", rel);
    }
}
