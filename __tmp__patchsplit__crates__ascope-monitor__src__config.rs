use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub log_root: PathBuf,
    /// How often a tracked session's snapshot is written to disk while live,
    /// in events. A fresh `Aggregator` writes after every event.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_every_events: u32,
}

fn default_snapshot_interval() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(ascope_core::resolve_workspace_path(None)
            .map_err(|e| crate::Error::Config(e.to_string()))?
            .join("config.toml"))
    }

    /// Probe each known producer's default log directory and enable the
    /// ones that exist on this machine.
    pub fn detect_providers() -> Self {
        let mut providers = HashMap::new();
        for producer in ascope_providers::all_producers() {
            if let Some(root) = producer.discover_session_directory()
                && root.exists()
            {
                providers.insert(
                    producer.id().to_string(),
                    ProviderConfig {
                        enabled: true,
                        log_root: root,
                        snapshot_every_events: default_snapshot_interval(),
                    },
                );
            }
        }
        Config { providers }
    }

    pub fn enabled_providers(&self) -> Vec<(&String, &ProviderConfig)> {
        self.providers.iter().filter(|(_, c)| c.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.providers.insert(
            "claude_code".into(),
            ProviderConfig {
                enabled: true,
                log_root: PathBuf::from("/home/dev/.claude/projects"),
                snapshot_every_events: 20,
            },
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.enabled_providers().len(), 1);
    }
}


