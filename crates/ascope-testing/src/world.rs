//! Declarative integration test setup.
//!
//! Builds an isolated temp directory with per-provider log roots and a
//! snapshot store, places synthetic session fixtures, and hands back either
//! a fully wired [`AscopeClient`] or a raw replay of one session's events
//! through a fresh [`Aggregator`] for tests that don't need the watcher.

use crate::fixtures::{SampleFiles, ToolCall};
use crate::providers::TestProvider;
use anyhow::{Context, Result};
use ascope_aggregator::Aggregator;
use ascope_monitor::{Config, ProviderConfig};
use ascope_providers::producer_for;
use ascope_sdk::{AscopeClient, SnapshotStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test environment: a temp root holding per-provider log
/// directories plus a snapshot directory, none of which touch the real
/// platform config/data paths.
pub struct TestWorld {
    temp_dir: TempDir,
    snapshot_root: PathBuf,
    log_roots: HashMap<TestProvider, PathBuf>,
    samples: SampleFiles,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a fresh environment with a log root for every supported
    /// provider and an empty snapshot directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let snapshot_root = temp_dir.path().join("snapshots");
        std::fs::create_dir_all(&snapshot_root).expect("failed to create snapshot dir");

        let mut log_roots = HashMap::new();
        for provider in TestProvider::all() {
            let root = temp_dir.path().join(provider.default_log_dir_name());
            std::fs::create_dir_all(&root).expect("failed to create provider log root");
            log_roots.insert(*provider, root);
        }

        Self { temp_dir, snapshot_root, log_roots, samples: SampleFiles::new() }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn snapshot_root(&self) -> &Path {
        &self.snapshot_root
    }

    pub fn log_root(&self, provider: TestProvider) -> &Path {
        &self.log_roots[&provider]
    }

    /// Place a synthetic session for `provider` under its log root, encoded
    /// for `cwd` the same way the real CLI agent would, and return the
    /// session file's path.
    pub fn add_session(&self, provider: TestProvider, session_id: &str, cwd: &str, calls: &[ToolCall]) -> Result<PathBuf> {
        let root = self.log_root(provider);
        match provider {
            TestProvider::Claude => self.samples.write_claude_session(root, session_id, cwd, calls),
            TestProvider::Codex => self.samples.write_codex_session(root, session_id, cwd, calls),
        }
    }

    /// A [`Config`] with every provider's log root pointed at this world's
    /// temp directories, all enabled.
    pub fn config(&self) -> Config {
        let mut providers = HashMap::new();
        for provider in TestProvider::all() {
            providers.insert(
                provider.id().to_string(),
                ProviderConfig { enabled: true, log_root: self.log_root(*provider).to_path_buf(), snapshot_every_events: 20 },
            );
        }
        Config { providers }
    }

    /// Build a client wired to this world's config and snapshot root.
    pub fn client(&self) -> AscopeClient {
        AscopeClient::connect(self.config(), self.snapshot_root.clone())
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(self.snapshot_root.clone())
    }

    /// Replay every event in the session file at `path` through a fresh
    /// aggregator for `provider`, without starting a watcher. Useful for
    /// tests focused on aggregation semantics rather than live tailing.
    pub fn replay(&self, provider: TestProvider, path: &Path) -> Result<Aggregator> {
        let adapter = producer_for(provider.id()).context("unknown provider")?;
        let mut reader = adapter.create_reader(path).context("failed to open session reader")?;
        let events = reader.read_all().context("failed to read session events")?;

        let mut aggregator = Aggregator::new(provider.id());
        for event in &events {
            aggregator.process_event(event);
        }
        Ok(aggregator)
    }
}
