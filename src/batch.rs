//! # Batch Runner
//! Runs every enabled agent once, one after another, against a shared trends
//! snapshot: recent articles → topic selection → article generation → cover
//! image → publish.
//!
//! Each agent's failure is recorded in its own outcome and never stops the
//! loop. `run_agent` has no dependency on sibling agents beyond the shared
//! selector state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::advisor::AdvisorContext;
use crate::articles::{RecentArticlesSource, RECENT_ARTICLES_LIMIT};
use crate::config::AgentConfig;
use crate::images::ImageSource;
use crate::publish::{ArticleDraft, Publisher};
use crate::selector::{SelectionRequest, TopicSelector};
use crate::trends::TrendsRequest;
use crate::writer::ContentWriter;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RecentArticles,
    Selection,
    Generation,
    Publish,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentStatus {
    Published {
        title: String,
        topic: String,
        position: usize,
        widened: bool,
        has_cover: bool,
        article_id: Option<String>,
    },
    Failed {
        stage: Stage,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentOutcome {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(flatten)]
    pub status: AgentStatus,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, AgentStatus::Published { .. })
    }

    fn failed(agent: &AgentConfig, stage: Stage, err: impl std::fmt::Display) -> Self {
        Self {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            status: AgentStatus::Failed {
                stage,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<AgentOutcome>,
}

impl BatchSummary {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            AgentStatus::Failed { message, .. } => Some((o.agent_id.as_str(), message.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BatchOptions {
    /// Clear session selections before the first agent.
    #[serde(default)]
    pub reset_session: bool,
    /// Restrict the run to these agent ids.
    #[serde(default)]
    pub agent_ids: Option<Vec<String>>,
}

pub struct BatchRunner {
    selector: Arc<TopicSelector>,
    articles: Arc<dyn RecentArticlesSource>,
    writer: ContentWriter,
    images: Arc<dyn ImageSource>,
    publisher: Arc<dyn Publisher>,
    trends: TrendsRequest,
    run_lock: Mutex<()>,
}

impl BatchRunner {
    pub fn new(
        selector: Arc<TopicSelector>,
        articles: Arc<dyn RecentArticlesSource>,
        writer: ContentWriter,
        images: Arc<dyn ImageSource>,
        publisher: Arc<dyn Publisher>,
        trends: TrendsRequest,
    ) -> Self {
        Self {
            selector,
            articles,
            writer,
            images,
            publisher,
            trends,
            run_lock: Mutex::new(()),
        }
    }

    pub fn selector(&self) -> &Arc<TopicSelector> {
        &self.selector
    }

    /// Run the roster sequentially. Concurrent calls wait for each other.
    pub async fn run(&self, agents: &[AgentConfig], opts: &BatchOptions) -> BatchSummary {
        let _guard = self.run_lock.lock().await;
        let started_at = Utc::now();

        if opts.reset_session {
            self.selector.session().reset();
        }

        let selected: Vec<&AgentConfig> = agents
            .iter()
            .filter(|a| a.enabled)
            .filter(|a| match &opts.agent_ids {
                Some(ids) => ids.iter().any(|id| id == &a.id),
                None => true,
            })
            .collect();

        info!(target: "batch", agents = selected.len(), "batch started");

        let mut outcomes = Vec::with_capacity(selected.len());
        for agent in selected {
            let outcome = self.run_agent(agent).await;
            let status = if outcome.is_success() { "published" } else { "failed" };
            counter!("batch_agents_total", "status" => status).increment(1);
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let summary = BatchSummary {
            started_at,
            finished_at: Utc::now(),
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        };
        gauge!("batch_last_run_ts").set(summary.finished_at.timestamp() as f64);
        info!(
            target: "batch",
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );
        summary
    }

    /// Full pipeline for one agent. Never panics on collaborator failure.
    pub async fn run_agent(&self, agent: &AgentConfig) -> AgentOutcome {
        let recent = match self
            .articles
            .recent_for_author(&agent.author_id, RECENT_ARTICLES_LIMIT)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "batch", agent = %agent.id, error = %format!("{e:#}"), "recent articles unavailable");
                return AgentOutcome::failed(agent, Stage::RecentArticles, format!("{e:#}"));
            }
        };

        let request = SelectionRequest {
            trends: self.trends.clone(),
            explicit_position: agent.trend_position,
            context: AdvisorContext {
                agent_name: agent.name.clone(),
                persona: agent.persona.clone(),
                focus_categories: agent.categories.clone(),
                recent_titles: recent.iter().map(|a| a.title.clone()).collect(),
            },
            recent_articles: recent,
        };

        let selected = match self.selector.select(&request).await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "batch", agent = %agent.id, error = %e, "topic selection failed");
                return AgentOutcome::failed(agent, Stage::Selection, e);
            }
        };

        let article = match self.writer.write(agent, &selected).await {
            Ok(a) => a,
            Err(e) => {
                warn!(target: "batch", agent = %agent.id, error = %format!("{e:#}"), "article generation failed");
                return AgentOutcome::failed(agent, Stage::Generation, format!("{e:#}"));
            }
        };

        let cover = match self.images.find_image(&selected.topic.query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(target: "batch", agent = %agent.id, error = %format!("{e:#}"), "cover image lookup failed, publishing without one");
                None
            }
        };
        if cover.is_none() {
            info!(target: "batch", agent = %agent.id, query = %selected.topic.query, "no cover image");
        }

        let draft = ArticleDraft {
            title: article.title.clone(),
            excerpt: article.excerpt,
            content_html: article.content_html,
            category: article.category,
            tags: article.tags,
            author_id: agent.author_id.clone(),
        };

        match self.publisher.publish(&draft, cover.as_ref()).await {
            Ok(receipt) => {
                info!(
                    target: "batch",
                    agent = %agent.id,
                    title = %draft.title,
                    status = receipt.status,
                    "article published"
                );
                AgentOutcome {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    status: AgentStatus::Published {
                        title: draft.title,
                        topic: selected.topic.title,
                        position: selected.position,
                        widened: selected.widened,
                        has_cover: cover.is_some(),
                        article_id: receipt.id,
                    },
                }
            }
            Err(e) => {
                warn!(target: "batch", agent = %agent.id, error = %format!("{e:#}"), "publish failed");
                AgentOutcome::failed(agent, Stage::Publish, format!("{e:#}"))
            }
        }
    }
}
