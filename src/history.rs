//! history.rs - in-memory log of recent batch runs for diagnostics.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::BatchSummary;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    // short fingerprints for quick diagnosis:
    pub topics: Vec<String>,   // published topics, in agent order
    pub failures: Vec<String>, // "agent: message"
}

impl From<&BatchSummary> for HistoryEntry {
    fn from(s: &BatchSummary) -> Self {
        use crate::batch::AgentStatus;
        let topics = s
            .outcomes
            .iter()
            .filter_map(|o| match &o.status {
                AgentStatus::Published { topic, .. } => Some(topic.clone()),
                _ => None,
            })
            .collect();
        let failures = s
            .failures()
            .map(|(agent, msg)| format!("{agent}: {msg}"))
            .collect();
        Self {
            finished_at: s.finished_at,
            total: s.total,
            succeeded: s.succeeded,
            failed: s.failed,
            topics,
            failures,
        }
    }
}

#[derive(Debug)]
pub struct BatchHistory {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
}

impl BatchHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, summary: &BatchSummary) {
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push_back(HistoryEntry::from(summary));
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    /// Oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{AgentOutcome, AgentStatus, Stage};

    fn summary(topic: &str) -> BatchSummary {
        BatchSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total: 2,
            succeeded: 1,
            failed: 1,
            outcomes: vec![
                AgentOutcome {
                    agent_id: "a".into(),
                    agent_name: "A".into(),
                    status: AgentStatus::Published {
                        title: "T".into(),
                        topic: topic.into(),
                        position: 1,
                        widened: false,
                        has_cover: false,
                        article_id: None,
                    },
                },
                AgentOutcome {
                    agent_id: "b".into(),
                    agent_name: "B".into(),
                    status: AgentStatus::Failed {
                        stage: Stage::Publish,
                        message: "HTTP 500".into(),
                    },
                },
            ],
        }
    }

    #[test]
    fn keeps_only_capacity_and_fingerprints() {
        let h = BatchHistory::with_capacity(2);
        h.push(&summary("uno"));
        h.push(&summary("dos"));
        h.push(&summary("tres"));
        let rows = h.snapshot_last_n(10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].topics, vec!["dos"]);
        assert_eq!(rows[1].topics, vec!["tres"]);
        assert_eq!(rows[1].failures, vec!["b: HTTP 500"]);
    }
}
