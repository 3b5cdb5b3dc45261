use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const TIMELINE_CAP: usize = 100;
const SUMMARY_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseLevel {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub summary: String,
    pub noise: NoiseLevel,
}

/// Bounded ring of human-readable timeline entries. Push evicts the oldest
/// entry once the cap is reached so memory stays flat across arbitrarily long
/// sessions; callers that need full history read from the snapshot store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    entries: VecDeque<TimelineEvent>,
}

impl Timeline {
    pub fn push(&mut self, timestamp: DateTime<Utc>, kind: &str, summary: &str, noise: NoiseLevel) {
        let truncated = if summary.chars().count() > SUMMARY_MAX_CHARS {
            let mut s: String = summary.chars().take(SUMMARY_MAX_CHARS).collect();
            s.push('\u{2026}');
            s
        } else {
            summary.to_string()
        };

        self.entries.push_back(TimelineEvent {
            timestamp,
            kind: kind.to_string(),
            summary: truncated,
            noise,
        });
        while self.entries.len() > TIMELINE_CAP {
            self.entries.pop_front();
        }
    }

    /// Defensive copy: callers get a snapshot of the ring, not a live view.
    pub fn entries(&self) -> Vec<TimelineEvent> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_once_over_cap() {
        let mut timeline = Timeline::default();
        for i in 0..(TIMELINE_CAP + 10) {
            timeline.push(Utc::now(), "event", &format!("entry {i}"), NoiseLevel::Normal);
        }
        assert_eq!(timeline.len(), TIMELINE_CAP);
        assert_eq!(timeline.entries()[0].summary, "entry 10");
    }

    #[test]
    fn truncates_long_summaries() {
        let mut timeline = Timeline::default();
        let long = "x".repeat(500);
        timeline.push(Utc::now(), "event", &long, NoiseLevel::Low);
        let stored = &timeline.entries()[0].summary;
        assert!(stored.chars().count() <= SUMMARY_MAX_CHARS + 1);
        assert!(stored.ends_with('\u{2026}'));
    }

    #[test]
    fn entries_returns_independent_copy() {
        let mut timeline = Timeline::default();
        timeline.push(Utc::now(), "event", "a", NoiseLevel::Normal);
        let mut copy = timeline.entries();
        copy.clear();
        assert_eq!(timeline.len(), 1);
    }
}


