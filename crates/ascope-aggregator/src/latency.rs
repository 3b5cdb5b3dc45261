use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const LATENCY_CAP: usize = 50;

/// One user-prompt-to-assistant-response cycle. The single-shot model this
/// engine observes (no intermediate streaming deltas in the event log) means
/// first-token latency and total-response latency are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub user_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub max_ms: u64,
    pub last_ms: u64,
    sum_ms: u64,
}

impl LatencyStats {
    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms as f64 / self.count as f64
        }
    }
}

/// Ring of recent user->assistant response latencies. Pending requests
/// (a user prompt with no assistant response yet) are not part of the
/// round-trip snapshot: a restored session starts with no outstanding
/// request, mirroring the pending-tool-call treatment elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyLog {
    records: VecDeque<LatencyRecord>,
    stats: LatencyStats,
    #[serde(skip)]
    pending_user_at: Option<DateTime<Utc>>,
}

impl LatencyLog {
    /// A user turn with non-empty text content opens a pending request.
    pub fn note_user_prompt(&mut self, timestamp: DateTime<Utc>) {
        self.pending_user_at = Some(timestamp);
    }

    /// An assistant turn carrying both `usage` and non-empty text content
    /// closes the pending request, if one is outstanding.
    pub fn note_assistant_response(&mut self, timestamp: DateTime<Utc>) {
        let Some(user_timestamp) = self.pending_user_at.take() else {
            return;
        };
        let latency_ms = (timestamp - user_timestamp).num_milliseconds().max(0) as u64;
        self.push(LatencyRecord { user_timestamp, response_timestamp: timestamp, latency_ms });
    }

    fn push(&mut self, record: LatencyRecord) {
        self.stats.count += 1;
        self.stats.sum_ms += record.latency_ms;
        self.stats.last_ms = record.latency_ms;
        self.stats.max_ms = self.stats.max_ms.max(record.latency_ms);

        self.records.push_back(record);
        while self.records.len() > LATENCY_CAP {
            self.records.pop_front();
        }
    }

    /// Defensive copy of the ring.
    pub fn records(&self) -> Vec<LatencyRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn stats(&self) -> LatencyStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.stats = LatencyStats::default();
        self.pending_user_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn closes_pending_request_on_next_assistant_response() {
        let mut log = LatencyLog::default();
        let t0 = Utc::now();
        log.note_user_prompt(t0);
        log.note_assistant_response(t0 + Duration::milliseconds(1500));

        assert_eq!(log.stats().count, 1);
        assert_eq!(log.records()[0].latency_ms, 1500);
    }

    #[test]
    fn assistant_response_with_no_pending_prompt_is_a_no_op() {
        let mut log = LatencyLog::default();
        log.note_assistant_response(Utc::now());
        assert_eq!(log.stats().count, 0);
    }

    #[test]
    fn stats_track_max_and_average_across_full_history_even_past_cap() {
        let mut log = LatencyLog::default();
        let t0 = Utc::now();
        for ms in [100, 50, 300] {
            log.note_user_prompt(t0);
            log.note_assistant_response(t0 + Duration::milliseconds(ms));
        }
        let stats = log.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max_ms, 300);
        assert!((stats.average_ms() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn records_ring_stays_bounded_but_stats_keep_accumulating() {
        let mut log = LatencyLog::default();
        let t0 = Utc::now();
        for i in 0..(LATENCY_CAP + 5) {
            log.note_user_prompt(t0);
            log.note_assistant_response(t0 + Duration::milliseconds(i as i64));
        }
        assert_eq!(log.records().len(), LATENCY_CAP);
        assert_eq!(log.stats().count, (LATENCY_CAP + 5) as u64);
    }

    #[test]
    fn reset_discards_pending_request() {
        let mut log = LatencyLog::default();
        log.note_user_prompt(Utc::now());
        log.reset();
        log.note_assistant_response(Utc::now());
        assert_eq!(log.stats().count, 0);
    }
}
