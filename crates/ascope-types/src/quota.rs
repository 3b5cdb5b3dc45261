use serde::{Deserialize, Serialize};

/// Producer-embedded rate-limit/quota snapshot, when a producer's session
/// log carries one (neither bundled producer currently does; this exists so
/// an adapter that later does has somewhere to put it without a breaking
/// change to [`crate::Event`] or the monitor's bus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaState {
    pub used: u64,
    pub limit: u64,
    pub resets_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl QuotaState {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}
