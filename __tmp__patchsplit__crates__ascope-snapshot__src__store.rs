use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk wrapper format. `schema_version` here versions this wrapper's own
/// layout (offsets map, metadata fields), not the aggregator state carried in
/// `state` — that is a separately versioned, opaque blob the aggregator
/// crate is responsible for interpreting.
pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub schema_version: u32,
    pub session_id: String,
    pub provider_id: String,
    pub updated_at: DateTime<Utc>,
    /// Byte offset into each log file already folded into `state`, so the
    /// incremental reader that resumes from this snapshot knows where to
    /// seek rather than replaying the file from the start.
    pub file_offsets: BTreeMap<String, u64>,
    pub state: serde_json::Value,
}

impl StoredSnapshot {
    pub fn new(session_id: impl Into<String>, provider_id: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            session_id: session_id.into(),
            provider_id: provider_id.into(),
            updated_at: Utc::now(),
            file_offsets: BTreeMap::new(),
            state,
        }
    }

    pub fn with_offset(mut self, path: impl Into<String>, offset: u64) -> Self {
        self.file_offsets.insert(path.into(), offset);
        self
    }
}

/// Snapshot store rooted at one directory per project, one JSON file per
/// session. Writes are atomic: the new body lands in a sibling temp file
/// first, then an `fs::rename` swaps it into place, so a reader never
/// observes a half-written snapshot and a crash mid-write leaves the
/// previous snapshot intact.
#[derive(Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root: `<data dir>/ascope/snapshots`, falling back to
    /// `~/.ascope/snapshots` when the platform data directory can't be
    /// resolved (e.g. a minimal container with no `$HOME`/`$XDG_DATA_HOME`).
    pub fn default_root() -> PathBuf {
        if let Some(dir) = dirs::data_dir() {
            return dir.join("ascope").join("snapshots");
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ascope")
            .join("snapshots")
    }

    fn project_dir(&self, project_hash: &str) -> PathBuf {
        self.root.join(project_hash)
    }

    fn session_path(&self, project_hash: &str, session_id: &str) -> PathBuf {
        self.project_dir(project_hash).join(format!("{session_id}.json"))
    }

    pub fn save(&self, project_hash: &str, snapshot: &StoredSnapshot) -> Result<()> {
        let dir = self.project_dir(project_hash);
        fs::create_dir_all(&dir)?;

        let body = serde_json::to_vec_pretty(snapshot)?;
        let final_path = self.session_path(project_hash, &snapshot.session_id);
        let tmp_path = dir.join(format!(".{}.tmp", snapshot.session_id));
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn load(&self, project_hash: &str, session_id: &str) -> Result<Option<StoredSnapshot>> {
        let path = self.session_path(project_hash, session_id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn require(&self, project_hash: &str, session_id: &str) -> Result<StoredSnapshot> {
        self.load(project_hash, session_id)?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))
    }

    pub fn delete(&self, project_hash: &str, session_id: &str) -> Result<()> {
        let path = self.session_path(project_hash, session_id);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Session ids with a snapshot under `project_hash`, sorted for stable
    /// iteration order.
    pub fn list_sessions(&self, project_hash: &str) -> Result<Vec<String>> {
        let dir = self.project_dir(project_hash);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (SnapshotStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (SnapshotStore::new(dir.path()), dir)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (store, _dir) = store();
        let snapshot = StoredSnapshot::new("sess-1", "claude_code", serde_json::json!({"event_count": 3}))
            .with_offset("/logs/sess-1.jsonl", 4096);

        store.save("proj-a", &snapshot).unwrap();
        let loaded = store.require("proj-a", "sess-1").unwrap();
        assert_eq!(loaded.session_id, "sess-1");
        assert_eq!(loaded.file_offsets["/logs/sess-1.jsonl"], 4096);
        assert_eq!(loaded.state["event_count"], 3);
    }

    #[test]
    fn missing_session_returns_none_on_load_and_not_found_on_require() {
        let (store, _dir) = store();
        assert!(store.load("proj-a", "missing").unwrap().is_none());
        assert!(matches!(store.require("proj-a", "missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn overwrite_replaces_previous_snapshot_atomically() {
        let (store, _dir) = store();
        store
            .save("proj-a", &StoredSnapshot::new("sess-1", "claude_code", serde_json::json!({"v": 1})))
            .unwrap();
        store
            .save("proj-a", &StoredSnapshot::new("sess-1", "claude_code", serde_json::json!({"v": 2})))
            .unwrap();

        let loaded = store.require("proj-a", "sess-1").unwrap();
        assert_eq!(loaded.state["v"], 2);
        assert_eq!(store.list_sessions("proj-a").unwrap(), vec!["sess-1"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _dir) = store();
        store
            .save("proj-a", &StoredSnapshot::new("sess-1", "claude_code", serde_json::json!({})))
            .unwrap();
        store.delete("proj-a", "sess-1").unwrap();
        store.delete("proj-a", "sess-1").unwrap();
        assert!(store.list_sessions("proj-a").unwrap().is_empty());
    }

    #[test]
    fn sessions_are_scoped_per_project() {
        let (store, _dir) = store();
        store
            .save("proj-a", &StoredSnapshot::new("sess-1", "claude_code", serde_json::json!({})))
            .unwrap();
        store
            .save("proj-b", &StoredSnapshot::new("sess-2", "codex", serde_json::json!({})))
            .unwrap();

        assert_eq!(store.list_sessions("proj-a").unwrap(), vec!["sess-1"]);
        assert_eq!(store.list_sessions("proj-b").unwrap(), vec!["sess-2"]);
    }
}


