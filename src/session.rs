//! session.rs - titles/positions already claimed during the current batch run.
//!
//! Lives for the whole process; the caller owns the batch boundary and calls
//! `reset()` between unrelated runs.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Default)]
struct SessionState {
    titles: HashSet<String>,
    positions: BTreeSet<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub titles: Vec<String>,
    pub positions: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct SessionDedupTracker {
    inner: Mutex<SessionState>,
}

/// Dedup identity of a title: lowercase, trimmed, inner whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl SessionDedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn mark_selected(&self, title: &str, position: usize) {
        let mut g = self.inner.lock().expect("session mutex poisoned");
        g.titles.insert(normalize_title(title));
        g.positions.insert(position);
    }

    pub fn is_title_selected(&self, title: &str) -> bool {
        let g = self.inner.lock().expect("session mutex poisoned");
        g.titles.contains(&normalize_title(title))
    }

    pub fn is_position_selected(&self, position: usize) -> bool {
        let g = self.inner.lock().expect("session mutex poisoned");
        g.positions.contains(&position)
    }

    pub fn reset(&self) {
        let mut g = self.inner.lock().expect("session mutex poisoned");
        g.titles.clear();
        g.positions.clear();
        tracing::info!(target: "selector", "session selections cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session mutex poisoned").titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let g = self.inner.lock().expect("session mutex poisoned");
        let mut titles: Vec<String> = g.titles.iter().cloned().collect();
        titles.sort();
        SessionSnapshot {
            titles,
            positions: g.positions.iter().copied().collect(),
        }
    }
}
