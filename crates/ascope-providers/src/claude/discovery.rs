use super::parser::ClaudeLineParser;
use super::schema::{ClaudeRecord, ClaudeUserContent};
use crate::jsonl_reader::JsonlReader;
use crate::traits::{IncrementalReader, ProducerAdapter};
use crate::{Error, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct ClaudeProducer;

struct ClaudeHeader {
    session_id: Option<String>,
    cwd: Option<String>,
    mtime: Option<std::time::SystemTime>,
    snippet: Option<String>,
    is_sidechain: bool,
}

fn probe(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if path.extension().is_none_or(|e| e != "jsonl") {
        return false;
    }
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn extract_header(path: &Path) -> Result<ClaudeHeader> {
    let file = std::fs::File::open(path)?;
    let mtime = file.metadata().ok().and_then(|m| m.modified().ok());
    let reader = BufReader::new(file);

    let mut session_id = None;
    let mut cwd = None;
    let mut snippet = None;
    let mut is_sidechain = false;

    for line in reader.lines().take(200).flatten() {
        let Ok(record) = serde_json::from_str::<ClaudeRecord>(&line) else {
            continue;
        };
        match &record {
            ClaudeRecord::User(user) => {
                if session_id.is_none() {
                    session_id = Some(user.session_id.clone());
                }
                if cwd.is_none() {
                    cwd = user.cwd.clone();
                }
                if snippet.is_none() && !user.is_sidechain && !user.is_meta {
                    snippet = match &user.message.content {
                        ClaudeUserContent::Text(text) => Some(text.clone()),
                        ClaudeUserContent::Blocks(_) => None,
                    };
                }
                is_sidechain = user.is_sidechain;
            }
            ClaudeRecord::Assistant(asst) => {
                if session_id.is_none() {
                    session_id = Some(asst.session_id.clone());
                }
                if cwd.is_none() {
                    cwd = asst.cwd.clone();
                }
            }
            _ => {}
        }
        if session_id.is_some() && cwd.is_some() && snippet.is_some() {
            break;
        }
    }

    Ok(ClaudeHeader {
        session_id,
        cwd,
        mtime,
        snippet,
        is_sidechain,
    })
}

impl ProducerAdapter for ClaudeProducer {
    fn id(&self) -> &'static str {
        "claude_code"
    }

    fn session_directory(&self, workspace_root: &Path) -> Option<PathBuf> {
        let root = self.discover_session_directory()?;
        Some(root.join(self.encode_workspace_path(workspace_root)))
    }

    fn discover_session_directory(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".claude").join("projects"))
    }

    fn encode_workspace_path(&self, project_root: &Path) -> String {
        let raw = project_root.to_string_lossy();
        let encoded = raw.replace(['/', '.'], "-");
        let encoded = encoded.trim_start_matches('-');
        format!("-{}", encoded)
    }

    fn is_session_ref(&self, value: &str) -> bool {
        uuid_like(value)
    }

    fn get_session_id(&self, path: &Path) -> Result<String> {
        extract_header(path)?
            .session_id
            .ok_or_else(|| Error::NoSessionFound(path.display().to_string()))
    }

    fn extract_session_label(&self, path: &Path) -> Option<String> {
        extract_header(path).ok().and_then(|h| h.snippet)
    }

    fn find_active_session(&self, session_dir: &Path) -> Result<Option<PathBuf>> {
        let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in WalkDir::new(session_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !probe(path) {
                continue;
            }
            let header = extract_header(path)?;
            if header.is_sidechain {
                continue;
            }
            if let Some(mtime) = header.mtime
                && best.as_ref().is_none_or(|(best_mtime, _)| mtime > *best_mtime)
            {
                best = Some((mtime, path.to_path_buf()));
            }
        }
        Ok(best.map(|(_, path)| path))
    }

    fn find_all_sessions(&self, session_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(session_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if probe(path) {
                let header = extract_header(path)?;
                if !header.is_sidechain {
                    paths.push(path.to_path_buf());
                }
            }
        }
        Ok(paths)
    }

    fn scan_subagents(&self, main_session_path: &Path) -> Result<Vec<PathBuf>> {
        let Some(session_id) = extract_header(main_session_path)?.session_id else {
            return Ok(Vec::new());
        };
        let Some(dir) = main_session_path.parent() else {
            return Ok(Vec::new());
        };

        let mut sidechains = Vec::new();
        for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path == main_session_path || !probe(path) {
                continue;
            }
            let header = extract_header(path)?;
            if header.is_sidechain && header.session_id.as_deref() == Some(session_id.as_str()) {
                sidechains.push(path.to_path_buf());
            }
        }
        Ok(sidechains)
    }

    fn create_reader(&self, path: &Path) -> Result<Box<dyn IncrementalReader>> {
        Ok(Box::new(JsonlReader::new(
            path.to_path_buf(),
            ClaudeLineParser,
        )))
    }
}

fn uuid_like(value: &str) -> bool {
    let stripped: String = value.chars().filter(|c| *c != '-').collect();
    stripped.len() == 32 && stripped.chars().all(|c| c.is_ascii_hexdigit())
}
