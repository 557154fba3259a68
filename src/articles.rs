// src/articles.rs
//! Recent articles per author, used only as similarity input.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many recent articles per author are compared against candidates.
pub const RECENT_ARTICLES_LIMIT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentArticleRef {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecentArticlesSource: Send + Sync {
    /// Newest first, at most `limit`.
    async fn recent_for_author(&self, author_id: &str, limit: usize)
        -> Result<Vec<RecentArticleRef>>;
}

/// Used when no articles API is configured: nothing to compare against.
pub struct NoRecentArticles;

#[async_trait]
impl RecentArticlesSource for NoRecentArticles {
    async fn recent_for_author(&self, _author_id: &str, _limit: usize) -> Result<Vec<RecentArticleRef>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArticlesBody {
    Wrapped { articles: Vec<RecentArticleRef> },
    Data { data: Vec<RecentArticleRef> },
    Bare(Vec<RecentArticleRef>),
}

impl ArticlesBody {
    fn into_vec(self) -> Vec<RecentArticleRef> {
        match self {
            ArticlesBody::Wrapped { articles } => articles,
            ArticlesBody::Data { data } => data,
            ArticlesBody::Bare(v) => v,
        }
    }
}

/// Reads `GET {base}/articles?author=..&limit=..&sort=-created_at`.
pub struct HttpArticlesSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpArticlesSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building articles http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RecentArticlesSource for HttpArticlesSource {
    async fn recent_for_author(
        &self,
        author_id: &str,
        limit: usize,
    ) -> Result<Vec<RecentArticleRef>> {
        let url = format!("{}/articles", self.base_url);
        let limit_s = limit.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("author", author_id),
                ("limit", limit_s.as_str()),
                ("sort", "-created_at"),
            ])
            .send()
            .await
            .with_context(|| format!("fetching recent articles for {author_id}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("articles API HTTP {}", status.as_u16()));
        }
        let body: ArticlesBody = resp.json().await.context("parsing articles response")?;
        Ok(newest_first(body.into_vec(), limit))
    }
}

/// Sort newest first and keep `limit`; the API's own ordering is not trusted.
pub fn newest_first(mut articles: Vec<RecentArticleRef>, limit: usize) -> Vec<RecentArticleRef> {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    articles.truncate(limit);
    articles
}
