// tests/common/mod.rs
//
// In-process fakes for every external collaborator, so the whole pipeline
// runs without network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use trend_news_agent::articles::{RecentArticleRef, RecentArticlesSource};
use trend_news_agent::config::{AgentConfig, Settings};
use trend_news_agent::images::{CoverImage, ImageSource};
use trend_news_agent::llm::{DynLlmClient, LlmClient};
use trend_news_agent::publish::{ArticleDraft, PublishReceipt, Publisher};
use trend_news_agent::trends::{TrendingTopic, TrendsRequest, TrendsSource};
use trend_news_agent::{Collaborators, Services};

/// Serves a fixed list; `failures` scripts error texts for the first calls.
pub struct FakeTrends {
    pub titles: Vec<String>,
    pub failures: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub credentials_seen: Mutex<Vec<String>>,
}

impl FakeTrends {
    pub fn new(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            failures: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            credentials_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_first(self: Arc<Self>, errors: &[&str]) -> Arc<Self> {
        *self.failures.lock().unwrap() = errors.iter().rev().map(|e| e.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrendsSource for FakeTrends {
    async fn fetch_trends(&self, request: &TrendsRequest, credential: &str) -> Result<Vec<TrendingTopic>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen.lock().unwrap().push(credential.to_string());
        if let Some(err) = self.failures.lock().unwrap().pop() {
            return Err(anyhow!(err));
        }
        Ok(self
            .titles
            .iter()
            .take(request.count)
            .map(|t| TrendingTopic::titled(t.as_str()))
            .collect())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Advisor replies pick the first listed candidate; writer replies echo the topic.
pub struct EchoLlm {
    pub fail_articles_for: Option<String>,
}

#[async_trait]
impl LlmClient for EchoLlm {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        if let Some(list) = prompt.split("Trending topics (position. title):\n").nth(1) {
            let first = list.lines().next().unwrap_or_default();
            let (pos, title) = first.split_once(". ").ok_or_else(|| anyhow!("no candidates"))?;
            return Ok(format!("POSITION: {pos}\nTITLE: {title}\nREASON: first listed"));
        }
        let topic = prompt
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("Write a news article about the trending topic: "))
            .ok_or_else(|| anyhow!("unexpected prompt"))?;
        if self.fail_articles_for.as_deref() == Some(topic) {
            return Err(anyhow!("model overloaded"));
        }
        Ok(format!(
            "TITLE: Nota sobre {topic}\nEXCERPT: Resumen de {topic}.\nCATEGORY: Actualidad\nTAGS: {topic}, tendencias\nCONTENT:\nPrimer párrafo sobre {topic}.\n\nSegundo párrafo."
        ))
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

#[derive(Default)]
pub struct FixedArticles {
    pub by_author: HashMap<String, Vec<RecentArticleRef>>,
}

impl FixedArticles {
    pub fn with(mut self, author: &str, titles: &[&str]) -> Self {
        let now = Utc::now();
        let refs = titles
            .iter()
            .enumerate()
            .map(|(i, t)| RecentArticleRef {
                title: t.to_string(),
                excerpt: String::new(),
                category: String::new(),
                created_at: now - Duration::hours(i as i64 + 1),
            })
            .collect();
        self.by_author.insert(author.to_string(), refs);
        self
    }
}

#[async_trait]
impl RecentArticlesSource for FixedArticles {
    async fn recent_for_author(&self, author_id: &str, limit: usize) -> Result<Vec<RecentArticleRef>> {
        let mut v = self.by_author.get(author_id).cloned().unwrap_or_default();
        v.truncate(limit);
        Ok(v)
    }
}

pub struct FlakyImages;

#[async_trait]
impl ImageSource for FlakyImages {
    async fn find_image(&self, query: &str) -> Result<Option<CoverImage>> {
        if query.contains("Boca") {
            return Err(anyhow!("image API HTTP 503"));
        }
        Ok(Some(CoverImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            content_type: "image/jpeg".into(),
            source_url: format!("https://img.test/{}", query.len()),
        }))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub drafts: Mutex<Vec<(ArticleDraft, bool)>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(ArticleDraft, bool)> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, draft: &ArticleDraft, cover: Option<&CoverImage>) -> Result<PublishReceipt> {
        let mut d = self.drafts.lock().unwrap();
        d.push((draft.clone(), cover.is_some()));
        Ok(PublishReceipt {
            status: 201,
            id: Some(format!("art-{}", d.len())),
            url: None,
        })
    }
}

pub fn agent(id: &str, position: Option<usize>) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        name: format!("Agent {id}"),
        author_id: format!("author-{id}"),
        persona: String::new(),
        categories: vec!["Actualidad".into()],
        default_category: None,
        trend_position: position,
        enabled: true,
    }
}

pub fn settings() -> Settings {
    Settings {
        trends_api_key: Some("primary-key".into()),
        trends_api_key_backup: Some("backup-key".into()),
        ..Settings::default()
    }
}

pub struct Harness {
    pub services: Arc<Services>,
    pub trends: Arc<FakeTrends>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness(
    agents: Vec<AgentConfig>,
    trends: Arc<FakeTrends>,
    articles: FixedArticles,
    llm: EchoLlm,
) -> Harness {
    harness_with_llm(agents, trends, articles, Arc::new(llm))
}

pub fn harness_with_llm(
    agents: Vec<AgentConfig>,
    trends: Arc<FakeTrends>,
    articles: FixedArticles,
    llm: DynLlmClient,
) -> Harness {
    let publisher = Arc::new(RecordingPublisher::default());
    let services = Services::assemble(
        settings(),
        agents,
        Collaborators {
            trends_source: trends.clone(),
            articles: Arc::new(articles),
            llm,
            images: Arc::new(FlakyImages),
            publisher: publisher.clone(),
        },
    );
    Harness {
        services: Arc::new(services),
        trends,
        publisher,
    }
}

pub const TOPICS: &[&str] = &[
    "Dólar blue hoy",
    "Boca Juniors River Plate",
    "Inflación de septiembre",
    "Lionel Messi Inter Miami",
    "Paro de colectivos",
];
