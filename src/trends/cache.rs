//! # Trends Cache
//! Time-bounded store of the last trends snapshot per geography.
//!
//! An entry is valid while `now - fetched_at < timeout`. Expired entries are
//! kept around so `status` can report them, but `get` treats them as a miss.
//! Absolute TTL, no sliding refresh.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;

use crate::trends::types::TrendsSnapshot;

pub const DEFAULT_CACHE_TIMEOUT_MINUTES: i64 = 20;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Empty,
    Valid,
    Expired,
}

/// Diagnostic view of one cache entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStatus {
    pub geo: String,
    pub state: CacheState,
    pub remaining_secs: i64,
    pub timeout_secs: i64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub topic_count: usize,
}

#[derive(Debug)]
pub struct TrendsCache {
    timeout: Duration,
    entries: Mutex<HashMap<String, TrendsSnapshot>>,
}

impl Default for TrendsCache {
    fn default() -> Self {
        Self::with_timeout_minutes(DEFAULT_CACHE_TIMEOUT_MINUTES)
    }
}

impl TrendsCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes.max(1)))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get(&self, geo: &str) -> Option<TrendsSnapshot> {
        self.get_at(geo, Utc::now())
    }

    /// Snapshot for `geo` if still valid at `now`. Absent and expired are both a miss.
    pub fn get_at(&self, geo: &str, now: DateTime<Utc>) -> Option<TrendsSnapshot> {
        let entries = self.entries.lock().expect("trends cache mutex poisoned");
        match entries.get(geo) {
            Some(snap) if now - snap.fetched_at < self.timeout => {
                counter!("trends_cache_hits_total").increment(1);
                Some(snap.clone())
            }
            _ => {
                counter!("trends_cache_misses_total").increment(1);
                None
            }
        }
    }

    pub fn set(&self, geo: &str, snapshot: TrendsSnapshot) -> TrendsSnapshot {
        self.set_at(geo, snapshot, Utc::now())
    }

    /// Replace the entry for `geo`, stamping `fetched_at = now`. Returns the stored snapshot.
    pub fn set_at(
        &self,
        geo: &str,
        mut snapshot: TrendsSnapshot,
        now: DateTime<Utc>,
    ) -> TrendsSnapshot {
        snapshot.fetched_at = now;
        let mut entries = self.entries.lock().expect("trends cache mutex poisoned");
        entries.insert(geo.to_string(), snapshot.clone());
        snapshot
    }

    /// Drop every entry. In-flight fetches are not awaited.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("trends cache mutex poisoned");
        let dropped = entries.len();
        entries.clear();
        tracing::info!(target: "trends", dropped, "trends cache cleared");
    }

    pub fn status(&self, geo: &str) -> CacheStatus {
        self.status_at(geo, Utc::now())
    }

    pub fn status_at(&self, geo: &str, now: DateTime<Utc>) -> CacheStatus {
        let entries = self.entries.lock().expect("trends cache mutex poisoned");
        let timeout_secs = self.timeout.num_seconds();
        match entries.get(geo) {
            None => CacheStatus {
                geo: geo.to_string(),
                state: CacheState::Empty,
                remaining_secs: 0,
                timeout_secs,
                fetched_at: None,
                topic_count: 0,
            },
            Some(snap) => {
                let age = now - snap.fetched_at;
                let (state, remaining_secs) = if age < self.timeout {
                    (CacheState::Valid, (self.timeout - age).num_seconds())
                } else {
                    (CacheState::Expired, 0)
                };
                CacheStatus {
                    geo: geo.to_string(),
                    state,
                    remaining_secs,
                    timeout_secs,
                    fetched_at: Some(snap.fetched_at),
                    topic_count: snap.topics.len(),
                }
            }
        }
    }
}
