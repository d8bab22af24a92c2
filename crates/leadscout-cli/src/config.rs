//! YAML configuration for the daemon and the offline commands. Every field
//! has a default so a missing file yields a runnable local setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leadscout_provider::{ProviderConfig, ProviderKind};
use leadscout_scout::ScoutConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// HTTP command surface bind address.
    pub listen_addr: String,
    /// How the operator's own messages are labeled on the surface.
    pub self_name: String,
    /// JSON capture file replayed as the thread source.
    pub capture_path: PathBuf,
    /// Log file directory; stderr only when absent.
    pub log_dir: Option<PathBuf>,
    pub provider: ProviderConfig,
    pub scrape: ScrapeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("leadscout.db"),
            listen_addr: "127.0.0.1:3000".to_string(),
            self_name: "You".to_string(),
            capture_path: PathBuf::from("capture.json"),
            log_dir: None,
            provider: ProviderConfig::new(ProviderKind::Ollama),
            scrape: ScrapeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub max_attempts: u32,
    pub max_no_progress: u32,
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
    pub load_timeout_ms: u64,
    pub classify_concurrency: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        let defaults = ScoutConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            max_no_progress: defaults.max_no_progress,
            pace_min_ms: defaults.pace_min_ms,
            pace_max_ms: defaults.pace_max_ms,
            load_timeout_ms: defaults.load_timeout.as_millis() as u64,
            classify_concurrency: defaults.classify_concurrency,
        }
    }
}

impl Config {
    /// Read the config file, falling back to defaults when it does not
    /// exist. A present-but-broken file is an error, not a silent default.
    /// No logging here: this runs before the subscriber is installed, so the
    /// caller reports the fallback once logging is up.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn scout_config(&self) -> ScoutConfig {
        ScoutConfig {
            self_name: self.self_name.clone(),
            max_attempts: self.scrape.max_attempts,
            max_no_progress: self.scrape.max_no_progress,
            pace_min_ms: self.scrape.pace_min_ms,
            pace_max_ms: self.scrape.pace_max_ms,
            load_timeout: std::time::Duration::from_millis(self.scrape.load_timeout_ms),
            classify_concurrency: self.scrape.classify_concurrency,
        }
    }
}
