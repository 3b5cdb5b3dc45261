use ascope_aggregator::Aggregator;
use ascope_types::QuotaState;
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

/// A repeating tool-call pattern the cycle detector found in the active
/// session's recent tool-call history.
#[derive(Debug, Clone)]
pub struct CycleDetection {
    pub session_id: String,
    /// The window size (6 or 10) the repeat was found in.
    pub window: usize,
}

/// Events this monitor publishes to anything downstream (SDK facade, a TUI,
/// an exporter) reading via [`crate::SessionMonitor::receiver`]. Only the
/// currently active session's events are published; other sessions this
/// monitor has discovered continue to be tracked in the background so a
/// later `switch_to_session` has somewhere to switch to, but do not spam
/// the bus until they become active.
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
    CycleDetected(CycleDetection),
    QuotaUpdate {
        session_id: String,
        quota: QuotaState,
    },
    Error {
        session_id: Option<String>,
        message: String,
    },
}
