//! # Topic Selector
//! Picks one trending topic for one agent.
//!
//! Flow: acquire snapshot (cache, else rotate-fetch and store) → drop topics
//! already claimed this session or too close to the agent's recent articles →
//! choose (explicit position, or advisory ranking) → commit to the session.
//!
//! Selections are serialized by an internal lock so two callers never claim
//! the same topic from the same snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::advisor::{AdviceError, AdvisorContext, TopicAdvisor};
use crate::articles::RecentArticleRef;
use crate::session::{normalize_title, SessionDedupTracker};
use crate::similarity::SimilarityMatcher;
use crate::trends::{KeyRotationProvider, TrendingTopic, TrendsCache, TrendsError, TrendsRequest, TrendsSnapshot};

/// A topic together with its 1-based position in the snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Candidate {
    pub position: usize,
    pub topic: TrendingTopic,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub trends: TrendsRequest,
    /// 1-based; out-of-range values are clamped to 1.
    pub explicit_position: Option<usize>,
    pub recent_articles: Vec<RecentArticleRef>,
    pub context: AdvisorContext,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectedTopic {
    pub topic: TrendingTopic,
    pub position: usize,
    pub justification: Option<String>,
    pub snapshot_fetched_at: DateTime<Utc>,
    /// Every topic was filtered out and the full snapshot was used instead.
    pub widened: bool,
    /// The explicit position was out of range and replaced by 1.
    pub clamped: bool,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Snapshot(#[from] TrendsError),

    #[error("trends snapshot for {geo} has no topics")]
    EmptySnapshot { geo: String },

    #[error(transparent)]
    Advice(#[from] AdviceError),

    #[error("advisor picked position {position} ({title:?}), which matches no candidate")]
    AdviceOutsideCandidates { position: usize, title: String },
}

pub struct TopicSelector {
    cache: Arc<TrendsCache>,
    provider: Arc<KeyRotationProvider>,
    session: Arc<SessionDedupTracker>,
    matcher: SimilarityMatcher,
    advisor: Arc<dyn TopicAdvisor>,
    select_lock: Mutex<()>,
}

impl TopicSelector {
    pub fn new(
        cache: Arc<TrendsCache>,
        provider: Arc<KeyRotationProvider>,
        session: Arc<SessionDedupTracker>,
        matcher: SimilarityMatcher,
        advisor: Arc<dyn TopicAdvisor>,
    ) -> Self {
        Self {
            cache,
            provider,
            session,
            matcher,
            advisor,
            select_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<TrendsCache> {
        &self.cache
    }

    pub fn session(&self) -> &Arc<SessionDedupTracker> {
        &self.session
    }

    pub fn provider(&self) -> &Arc<KeyRotationProvider> {
        &self.provider
    }

    /// Cached snapshot for the geo, or a fresh one stored in the cache.
    /// An expired entry is never served.
    pub async fn acquire_snapshot(
        &self,
        req: &TrendsRequest,
    ) -> Result<TrendsSnapshot, SelectionError> {
        if let Some(snap) = self.cache.get(&req.geo) {
            debug!(target: "selector", geo = %req.geo, topics = snap.topics.len(), "trends cache hit");
            return Ok(snap);
        }

        let fresh = self.provider.fetch(req).await?;
        if fresh.topics.is_empty() {
            return Err(SelectionError::EmptySnapshot {
                geo: req.geo.clone(),
            });
        }
        Ok(self.cache.set(&req.geo, fresh))
    }

    /// Topics not claimed this session and not too similar to `recent`.
    /// Falls back to every topic when nothing survives; the flag reports that.
    pub fn filter_candidates(
        &self,
        snapshot: &TrendsSnapshot,
        recent: &[RecentArticleRef],
    ) -> (Vec<Candidate>, bool) {
        let all: Vec<Candidate> = snapshot
            .topics
            .iter()
            .enumerate()
            .map(|(i, t)| Candidate {
                position: i + 1,
                topic: t.clone(),
            })
            .collect();

        let kept: Vec<Candidate> = all
            .iter()
            .filter(|c| {
                if self.session.is_title_selected(&c.topic.title)
                    || self.session.is_position_selected(c.position)
                {
                    return false;
                }
                if let Some(hit) = self.matcher.find_similar(&c.topic.title, recent) {
                    counter!("selector_similar_rejected_total").increment(1);
                    debug!(
                        target: "selector",
                        candidate = %c.topic.title,
                        article = %hit.article_title,
                        score = hit.score,
                        "candidate too similar to a recent article"
                    );
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        if kept.is_empty() {
            counter!("selector_fallback_total").increment(1);
            warn!(
                target: "selector",
                total = all.len(),
                "every trending topic was filtered out, widening to the full snapshot"
            );
            return (all, true);
        }
        (kept, false)
    }

    pub async fn select(&self, req: &SelectionRequest) -> Result<SelectedTopic, SelectionError> {
        let snapshot = self.acquire_snapshot(&req.trends).await?;
        if snapshot.topics.is_empty() {
            return Err(SelectionError::EmptySnapshot {
                geo: snapshot.geo.clone(),
            });
        }

        let _guard = self.select_lock.lock().await;

        let chosen = match req.explicit_position {
            Some(requested) => self.choose_explicit(&snapshot, requested, &req.recent_articles),
            None => {
                let (candidates, widened) =
                    self.filter_candidates(&snapshot, &req.recent_articles);
                let pick = self.advisor.choose(&candidates, &req.context).await?;
                let Some(candidate) = match_pick(&candidates, pick.position, &pick.title) else {
                    return Err(SelectionError::AdviceOutsideCandidates {
                        position: pick.position,
                        title: pick.title,
                    });
                };
                SelectedTopic {
                    topic: candidate.topic.clone(),
                    position: candidate.position,
                    justification: Some(pick.justification).filter(|j| !j.is_empty()),
                    snapshot_fetched_at: snapshot.fetched_at,
                    widened,
                    clamped: false,
                }
            }
        };

        self.session
            .mark_selected(&chosen.topic.title, chosen.position);
        info!(
            target: "selector",
            agent = %req.context.agent_name,
            position = chosen.position,
            title = %chosen.topic.title,
            widened = chosen.widened,
            "topic selected"
        );
        Ok(chosen)
    }

    fn choose_explicit(
        &self,
        snapshot: &TrendsSnapshot,
        requested: usize,
        recent: &[RecentArticleRef],
    ) -> SelectedTopic {
        let len = snapshot.topics.len();
        let (position, clamped) = if (1..=len).contains(&requested) {
            (requested, false)
        } else {
            warn!(
                target: "selector",
                requested,
                available = len,
                "explicit position out of range, using position 1"
            );
            (1, true)
        };
        let topic = snapshot.topics[position - 1].clone();

        if self.session.is_position_selected(position) || self.session.is_title_selected(&topic.title) {
            warn!(target: "selector", position, "explicit position already used in this session");
        }
        if self.matcher.is_too_similar(&topic.title, recent) {
            warn!(target: "selector", position, "explicit topic resembles a recent article");
        }

        SelectedTopic {
            topic,
            position,
            justification: None,
            snapshot_fetched_at: snapshot.fetched_at,
            widened: false,
            clamped,
        }
    }
}

/// Candidate at `position` whose title agrees with `title`
/// (normalized equality or one containing the other).
fn match_pick<'a>(candidates: &'a [Candidate], position: usize, title: &str) -> Option<&'a Candidate> {
    let want = normalize_title(title);
    candidates.iter().find(|c| {
        if c.position != position {
            return false;
        }
        let have = normalize_title(&c.topic.title);
        have == want || have.contains(&want) || want.contains(&have)
    })
}
