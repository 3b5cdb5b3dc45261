//! Workspace path resolution and git-worktree-aware project hashing, shared
//! by every ascope crate that needs to locate a project's log root or key a
//! snapshot by project identity.

mod path;

pub use path::{
    discover_project_root, expand_tilde, normalize_path, paths_equal, project_hash_from_log_path,
    project_hash_from_root, resolve_effective_project_hash, resolve_workspace_path, Error,
    ProjectHash, Result,
};
