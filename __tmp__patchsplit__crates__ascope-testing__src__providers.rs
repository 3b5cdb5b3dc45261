//! Provider definitions for testing logic.
//!
//! Abstracts over each producer's log directory naming and fixture format so
//! tests can be written once and run against every supported provider.

/// Supported test providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestProvider {
    Claude,
    Codex,
}

impl TestProvider {
    /// Provider id as used in `ascope-providers::producer_for`.
    pub fn id(&self) -> &'static str {
        match self {
            TestProvider::Claude => "claude_code",
            TestProvider::Codex => "codex",
        }
    }

    /// Default log directory name relative to a fake home, e.g. `.claude`.
    pub fn default_log_dir_name(&self) -> &'static str {
        match self {
            TestProvider::Claude => ".claude",
            TestProvider::Codex => ".codex",
        }
    }

    pub fn all() -> &'static [TestProvider] {
        &[TestProvider::Claude, TestProvider::Codex]
    }
}

impl std::fmt::Display for TestProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}


