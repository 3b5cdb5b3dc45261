use crate::bus::SessionPhase;
use ascope_aggregator::Aggregator;
use ascope_providers::IncrementalReader;
use std::path::PathBuf;
use std::time::SystemTime;

/// One session file under active supervision: its incremental reader, the
/// aggregator folding its events, and enough lifecycle bookkeeping for the
/// monitor to decide when to snapshot and when to mark it ended.
pub(crate) struct TrackedSession {
    pub provider_id: String,
    pub path: PathBuf,
    pub reader: Box<dyn IncrementalReader>,
    pub aggregator: Aggregator,
    pub phase: SessionPhase,
    pub last_activity: SystemTime,
    pub events_since_snapshot: u32,
}

impl TrackedSession {
    pub fn new(
        provider_id: &str,
        path: PathBuf,
        reader: Box<dyn IncrementalReader>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            path,
            reader,
            aggregator,
            phase: SessionPhase::Discovery,
            last_activity: SystemTime::now(),
            events_since_snapshot: 0,
        }
    }
}


