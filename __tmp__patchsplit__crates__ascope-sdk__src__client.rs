use crate::error::{Error, Result};
use crate::watch::LiveStream;
use ascope_monitor::{Config, ProviderContext, SessionMonitor};
use ascope_providers::producer_for;
use ascope_snapshot::SnapshotStore;
use std::path::PathBuf;

/// Facade over discovery, config, snapshot storage, and live monitoring.
/// Everything downstream (a TUI, an exporter, a one-off script) talks to
/// this instead of wiring `ascope-monitor`/`ascope-snapshot` together itself.
pub struct AscopeClient {
    config: Config,
    store: SnapshotStore,
}

impl AscopeClient {
    /// Connect using auto-detected provider log roots and the default
    /// snapshot directory for this platform.
    pub fn connect_default() -> Result<Self> {
        Ok(Self {
            config: Config::detect_providers(),
            store: SnapshotStore::new(SnapshotStore::default_root()),
        })
    }

    /// Connect with an explicit config and snapshot root, e.g. for tests or
    /// a non-default workspace location.
    pub fn connect(config: Config, snapshot_root: impl Into<PathBuf>) -> Self {
        Self { config, store: SnapshotStore::new(snapshot_root.into()) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Start watching every enabled provider's log root under `project_hash`
    /// and return an async stream of monitor events.
    pub fn watch(&self, project_hash: &str) -> Result<LiveStream> {
        let mut contexts = Vec::new();
        for (id, provider_config) in self.config.enabled_providers() {
            let producer = producer_for(id).map_err(|e| Error::InvalidInput(e.to_string()))?;
            contexts.push(ProviderContext {
                provider: producer,
                log_root: provider_config.log_root.clone(),
                project_hash: project_hash.to_string(),
                snapshot_every_events: provider_config.snapshot_every_events,
            });
        }
        if contexts.is_empty() {
            return Err(Error::InvalidInput(
                "no enabled providers with a discoverable log root".into(),
            ));
        }

        let monitor = SessionMonitor::start(contexts, self.store.clone())?;
        Ok(LiveStream::new(monitor))
    }
}


