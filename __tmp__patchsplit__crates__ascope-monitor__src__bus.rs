use ascope_aggregator::Aggregator;
use std::path::PathBuf;

/// A session's place in its lifecycle, surfaced to bus subscribers so a UI
/// or exporter can distinguish a session still catching up on history from
/// one that's genuinely live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Session file found, not yet read.
    Discovery,
    /// Restoring/fast-forwarding from a prior snapshot or from the start of
    /// the file; events are folded into the aggregator but not published.
    Replay,
    /// Caught up; new events are published as they arrive.
    Live,
    /// The session file has not changed for longer than the idle threshold.
    Ended,
}

/// Events this monitor publishes to anything downstream (SDK facade, a TUI,
/// an exporter) reading via [`crate::SessionMonitor::receiver`].
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    SessionDiscovered {
        session_id: String,
        provider_id: String,
        path: PathBuf,
    },
    PhaseChanged {
        session_id: String,
        phase: SessionPhase,
    },
    Updated {
        session_id: String,
        aggregator: Box<Aggregator>,
    },
    Rotated {
        old_path: PathBuf,
        new_path: PathBuf,
    },
    Error {
        session_id: Option<String>,
        message: String,
    },
}


