use super::parser::CodexLineParser;
use super::schema::CodexRecord;
use crate::jsonl_reader::JsonlReader;
use crate::traits::{IncrementalReader, ProducerAdapter};
use crate::{Error, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Codex stores sessions flat under a global, date-bucketed directory rather
/// than one subdirectory per project, so unlike Claude it has no per-project
/// `session_directory` and identifies project membership from each file's
/// `session_meta.cwd` instead of from directory structure.
pub struct CodexProducer;

fn probe(path: &Path) -> bool {
    let is_jsonl = path.extension().is_some_and(|e| e == "jsonl");
    let name = path.file_name().and_then(|f| f.to_str()).unwrap_or("");
    is_jsonl
        && name.starts_with("rollout-")
        && std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn session_id_and_cwd(path: &Path) -> Result<(Option<String>, Option<String>)> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    for line in reader.lines().take(10).flatten() {
        if let Ok(CodexRecord::SessionMeta(meta)) = serde_json::from_str::<CodexRecord>(&line) {
            return Ok((Some(meta.payload.id), Some(meta.payload.cwd)));
        }
    }
    Ok((None, None))
}

impl ProducerAdapter for CodexProducer {
    fn id(&self) -> &'static str {
        "codex"
    }

    fn session_directory(&self, _workspace_root: &Path) -> Option<PathBuf> {
        None
    }

    fn discover_session_directory(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codex").join("sessions"))
    }

    fn encode_workspace_path(&self, _project_root: &Path) -> String {
        String::new()
    }

    fn is_session_ref(&self, value: &str) -> bool {
        let stripped: String = value.chars().filter(|c| *c != '-').collect();
        stripped.len() == 32 && stripped.chars().all(|c| c.is_ascii_hexdigit())
    }

    fn get_session_id(&self, path: &Path) -> Result<String> {
        session_id_and_cwd(path)?
            .0
            .ok_or_else(|| Error::NoSessionFound(path.display().to_string()))
    }

    fn extract_session_label(&self, _path: &Path) -> Option<String> {
        None
    }

    fn find_active_session(&self, session_dir: &Path) -> Result<Option<PathBuf>> {
        let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in WalkDir::new(session_dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !probe(path) {
                continue;
            }
            let mtime = std::fs::metadata(path).ok().and_then(|m| m.modified().ok());
            if let Some(mtime) = mtime
                && best.as_ref().is_none_or(|(best_mtime, _)| mtime > *best_mtime)
            {
                best = Some((mtime, path.to_path_buf()));
            }
        }
        Ok(best.map(|(_, path)| path))
    }

    fn find_all_sessions(&self, session_dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(WalkDir::new(session_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.path().to_path_buf())
            .filter(|p| probe(p))
            .collect())
    }

    fn scan_subagents(&self, _main_session_path: &Path) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn create_reader(&self, path: &Path) -> Result<Box<dyn IncrementalReader>> {
        Ok(Box::new(JsonlReader::new(
            path.to_path_buf(),
            CodexLineParser,
        )))
    }
}
