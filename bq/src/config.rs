//! boundq configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;

/// Project-local settings file, looked up in the working directory
const LOCAL_FILE: &str = ".boundq.yml";

/// Main configuration: queue settings plus the items each producer offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue, consumer and pacing settings
    pub queue: CoordinatorConfig,

    /// One list per producer
    pub sources: Vec<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: CoordinatorConfig::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<Vec<String>> {
    [["Apple", "Banana", "Cherry"], ["Dog", "Elephant", "Fox"], ["Green", "Blue", "Red"]]
        .iter()
        .map(|source| source.iter().map(|item| item.to_string()).collect())
        .collect()
}

impl Config {
    /// Check the configuration before a run starts
    pub fn validate(&self) -> Result<()> {
        self.queue.validate()?;

        if self.sources.is_empty() {
            return Err(eyre::eyre!("At least one source is required"));
        }
        for (index, source) in self.sources.iter().enumerate() {
            if let Some(position) = source.iter().position(|item| item.is_empty()) {
                return Err(eyre::eyre!(
                    "Source {} has an empty item at position {}",
                    index + 1,
                    position + 1
                ));
            }
        }
        Ok(())
    }

    /// Total number of items across every source
    pub fn total_items(&self) -> usize {
        self.sources.iter().map(Vec::len).sum()
    }

    /// Resolve the run settings
    ///
    /// An explicit path must load. Otherwise the first readable file from
    /// [`search_paths`](Self::search_paths) wins, and the built-in demo is
    /// used when none exists.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path).with_context(|| format!("Cannot use run settings at {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if !candidate.is_file() {
                continue;
            }
            match Self::read(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %candidate.display(), error = %e, "Config::load: skipping settings file"),
            }
        }

        tracing::info!("Config::load: no settings file, running the built-in demo sources");
        Ok(Self::default())
    }

    /// Settings files consulted when no path is given, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("boundq").join("boundq.yml"));
        }
        paths
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).context("Settings file is not readable")?;
        let config: Self = serde_yaml::from_str(&text).context("Settings file is not valid boundq YAML")?;

        tracing::info!(path = %path.display(), producers = config.sources.len(), "Config::load: settings loaded");
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
