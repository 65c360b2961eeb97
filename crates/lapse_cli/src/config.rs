//! Lapse configuration file handling
//!
//! Settings live in `lapse.toml`. Every key has a default, so a missing file
//! or a partial one is fine; command-line flags override what the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up by `load_from_dir`
pub const CONFIG_FILE: &str = "lapse.toml";

/// Workspace-level configuration (lapse.toml)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LapseConfig {
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

/// The selector to present
#[derive(Debug, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// Identifiers offered to the user, in display order
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
    /// Time allowed before the selector times out
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_choices() -> Vec<String> {
    ["1", "2", "3", "4"].iter().map(|c| c.to_string()).collect()
}

fn default_deadline_ms() -> u64 {
    5000
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            choices: default_choices(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

/// Real-time scheduler settings
#[derive(Debug, Deserialize, Serialize)]
pub struct TimerConfig {
    /// Interval between background scheduler ticks
    #[serde(default = "default_resolution_ms")]
    pub resolution_ms: u64,
}

fn default_resolution_ms() -> u64 {
    1
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            resolution_ms: default_resolution_ms(),
        }
    }
}

impl LapseConfig {
    /// Load `lapse.toml` from a directory, or defaults if there is none
    pub fn load_from_dir(path: &Path) -> Result<Self> {
        let config_path = path.join(CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, path.display());
            return Ok(Self::default());
        }
        Self::load(&config_path)
    }

    /// Load an explicit configuration file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LapseConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, choices: Option<Vec<String>>, deadline_ms: Option<u64>) -> Self {
        if let Some(choices) = choices {
            self.selector.choices = choices;
        }
        if let Some(deadline_ms) = deadline_ms {
            self.selector.deadline_ms = deadline_ms;
        }
        self
    }

    /// Reject settings the selector or scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.selector.choices.is_empty() {
            anyhow::bail!("selector.choices must not be empty");
        }
        for (i, choice) in self.selector.choices.iter().enumerate() {
            if self.selector.choices[..i].contains(choice) {
                anyhow::bail!("selector.choices contains '{}' more than once", choice);
            }
        }
        if self.timer.resolution_ms == 0 {
            anyhow::bail!("timer.resolution_ms must be at least 1");
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.selector.deadline_ms)
    }

    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.timer.resolution_ms)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Write a default `lapse.toml` into `dir`, returning its path
    ///
    /// An existing file is only replaced when `force` is set.
    pub fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() && !force {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite it",
                path.display()
            );
        }

        fs::write(&path, Self::default().to_toml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
