//! app.rs - shared service graph used by the HTTP server and the batch CLI.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::advisor::LlmTopicAdvisor;
use crate::articles::{HttpArticlesSource, NoRecentArticles, RecentArticlesSource};
use crate::batch::{BatchOptions, BatchRunner, BatchSummary};
use crate::config::{AgentConfig, Settings};
use crate::history::BatchHistory;
use crate::images::{ImageSource, NoImages, PexelsImageSource};
use crate::llm::{build_llm_client, DynLlmClient};
use crate::notify::BatchNotifier;
use crate::publish::{DryRunPublisher, HttpPublisher, Publisher};
use crate::selector::TopicSelector;
use crate::session::SessionDedupTracker;
use crate::similarity::SimilarityMatcher;
use crate::trends::serpapi::SerpApiTrendsSource;
use crate::trends::{Credentials, KeyRotationProvider, TrendsCache, TrendsSource};
use crate::writer::ContentWriter;

/// External systems the pipeline talks to. Tests swap these for fakes.
pub struct Collaborators {
    pub trends_source: Arc<dyn TrendsSource>,
    pub articles: Arc<dyn RecentArticlesSource>,
    pub llm: DynLlmClient,
    pub images: Arc<dyn ImageSource>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Real clients where configured, inert stand-ins elsewhere.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let trends_source: Arc<dyn TrendsSource> =
            Arc::new(SerpApiTrendsSource::new(settings.trends_api_url.as_deref())?);

        let articles: Arc<dyn RecentArticlesSource> = match &settings.articles_api_url {
            Some(url) => Arc::new(HttpArticlesSource::new(url)?),
            None => {
                info!("ARTICLES_API_URL not set; similarity check has no recent articles");
                Arc::new(NoRecentArticles)
            }
        };

        let llm = build_llm_client(
            settings.openai_api_key.as_deref(),
            settings.llm_model.as_deref(),
        )?;

        let images: Arc<dyn ImageSource> = match &settings.image_api_key {
            Some(key) => Arc::new(PexelsImageSource::new(key, settings.image_api_url.as_deref())?),
            None => Arc::new(NoImages),
        };

        let publisher: Arc<dyn Publisher> = match &settings.publish_api_url {
            Some(url) => Arc::new(HttpPublisher::new(
                url,
                settings.publish_api_token.as_deref(),
            )?),
            None => {
                info!("PUBLISH_API_URL not set; articles are logged, not published");
                Arc::new(DryRunPublisher)
            }
        };

        Ok(Self {
            trends_source,
            articles,
            llm,
            images,
            publisher,
        })
    }
}

pub struct Services {
    pub settings: Settings,
    pub agents: Vec<AgentConfig>,
    pub cache: Arc<TrendsCache>,
    pub session: Arc<SessionDedupTracker>,
    pub provider: Arc<KeyRotationProvider>,
    pub selector: Arc<TopicSelector>,
    pub runner: BatchRunner,
    pub history: BatchHistory,
    pub notifier: BatchNotifier,
}

impl Services {
    pub fn from_settings(settings: Settings, agents: Vec<AgentConfig>) -> Result<Self> {
        let collaborators = Collaborators::from_settings(&settings)?;
        Ok(Self::assemble(settings, agents, collaborators))
    }

    pub fn assemble(settings: Settings, agents: Vec<AgentConfig>, c: Collaborators) -> Self {
        let cache = Arc::new(TrendsCache::with_timeout_minutes(settings.cache_timeout_minutes));
        let session = Arc::new(SessionDedupTracker::new());
        let credentials = Credentials::new(
            settings.trends_api_key.clone(),
            settings.trends_api_key_backup.clone(),
        );
        let provider = Arc::new(KeyRotationProvider::new(c.trends_source, credentials));

        let selector = Arc::new(TopicSelector::new(
            cache.clone(),
            provider.clone(),
            session.clone(),
            SimilarityMatcher::new(settings.similarity.clone()),
            Arc::new(LlmTopicAdvisor::new(c.llm.clone())),
        ));

        let runner = BatchRunner::new(
            selector.clone(),
            c.articles,
            ContentWriter::new(c.llm),
            c.images,
            c.publisher,
            settings.trends.clone(),
        );

        let history = BatchHistory::with_capacity(settings.history_capacity);
        let notifier = BatchNotifier::new(settings.discord_webhook_url.as_deref());

        Self {
            settings,
            agents,
            cache,
            session,
            provider,
            selector,
            runner,
            history,
            notifier,
        }
    }

    /// One batch over the configured roster, then history and notification.
    pub async fn run_batch(&self, opts: &BatchOptions) -> BatchSummary {
        let summary = self.runner.run(&self.agents, opts).await;
        self.history.push(&summary);
        self.notifier.notify(&summary).await;
        summary
    }
}
