use crate::Result;
use ascope_types::Event;
use std::path::{Path, PathBuf};

/// A provider's integration with a single AI coding agent's log format.
///
/// Responsibilities: locate where a given provider writes its session logs,
/// tell sessions apart from each other, and hand back an incremental reader
/// for a specific session file. Implementations never parse file contents
/// themselves outside of what's needed to answer these questions cheaply.
pub trait ProducerAdapter: Send + Sync {
    /// Stable identifier, e.g. "claude_code", "codex".
    fn id(&self) -> &'static str;

    /// Directory under `workspace_root` where this provider's logs for the
    /// current project live, if the provider organizes logs by project.
    fn session_directory(&self, workspace_root: &Path) -> Option<PathBuf>;

    /// Provider's default, global session log root (e.g. `~/.claude/projects`),
    /// independent of any particular project.
    fn discover_session_directory(&self) -> Option<PathBuf>;

    /// Encode a project's absolute path the way this provider names its
    /// on-disk project directory (e.g. Claude replaces `/` and `.` with `-`).
    fn encode_workspace_path(&self, project_root: &Path) -> String;

    /// True if `value` looks like a session identifier this provider would
    /// produce (as opposed to a file path or something else).
    fn is_session_ref(&self, value: &str) -> bool;

    /// Read just enough of `path` to extract its session id.
    fn get_session_id(&self, path: &Path) -> Result<String>;

    /// A short human-readable label for the session (first user message
    /// snippet, typically), read cheaply without a full parse.
    fn extract_session_label(&self, path: &Path) -> Option<String>;

    /// The most recently active session file under `session_dir`, if any.
    fn find_active_session(&self, session_dir: &Path) -> Result<Option<PathBuf>>;

    /// Every session file under `session_dir`.
    fn find_all_sessions(&self, session_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Sidechain/subagent files spawned from `main_session_path`, if this
    /// provider supports subagents. Empty for providers that don't.
    fn scan_subagents(&self, main_session_path: &Path) -> Result<Vec<PathBuf>>;

    /// Build an incremental reader positioned at the start of `path`.
    fn create_reader(&self, path: &Path) -> Result<Box<dyn IncrementalReader>>;
}

/// Stateful cursor over a single session file, used by the monitor to poll
/// for newly appended events without re-parsing what it has already seen.
pub trait IncrementalReader: Send {
    /// Parse and return events appended since the last read.
    fn read_new(&mut self) -> Result<Vec<Event>>;

    /// Parse the file from the beginning, resetting the cursor to the end.
    fn read_all(&mut self) -> Result<Vec<Event>>;

    /// Drop any buffered partial line. Called after a detected truncation.
    fn flush(&mut self);

    /// Byte offset the next `read_new` will resume from.
    fn get_position(&self) -> u64;

    /// Move the cursor to an arbitrary byte offset (used when restoring from
    /// a snapshot).
    fn seek_to(&mut self, position: u64) -> Result<()>;

    /// Whether the underlying file still exists.
    fn exists(&self) -> bool;

    /// True if the file's current size is smaller than the cursor position,
    /// meaning it was truncated or replaced since the last read.
    fn was_truncated(&mut self) -> Result<bool>;
}


