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
    /// Size each tracked file was observed at when this snapshot was taken.
    /// `is_valid` uses this to confirm the file has only grown since, not
    /// been truncated or replaced out from under a stale offset.
    #[serde(default)]
    pub source_sizes: BTreeMap<String, u64>,
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
            source_sizes: BTreeMap::new(),
            state,
        }
    }

    pub fn with_offset(mut self, path: impl Into<String>, offset: u64, source_size: u64) -> Self {
        let path = path.into();
        self.file_offsets.insert(path.clone(), offset);
        self.source_sizes.insert(path, source_size);
        self
    }

    /// A snapshot is valid to resume from only if it was taken by the same
    /// schema and provider, and every file it recorded an offset for still
    /// exists in `current_sizes` at a size no smaller than it was at
    /// snapshot time, with the stored offset still inside that size. Any
    /// failure (missing file, shrunk file, offset past the current size,
    /// mismatched provider or schema) means the caller must delete this
    /// snapshot and fall back to a full replay rather than seek blindly.
    pub fn is_valid(&self, provider_id: &str, current_sizes: &BTreeMap<String, u64>) -> bool {
        if self.schema_version != STORE_SCHEMA_VERSION || self.provider_id != provider_id {
            return false;
        }
        self.file_offsets.iter().all(|(path, &offset)| {
            let Some(&current_size) = current_sizes.get(path) else {
                return false;
            };
            if offset > current_size {
                return false;
            }
            match self.source_sizes.get(path) {
                Some(&recorded_size) => current_size >= recorded_size,
                None => true,
            }
        })
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
