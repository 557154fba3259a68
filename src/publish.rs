// src/publish.rs
//! Publishing endpoint client.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::images::CoverImage;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub excerpt: String,
    pub content_html: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PublishReceipt {
    pub status: u16,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, draft: &ArticleDraft, cover: Option<&CoverImage>) -> Result<PublishReceipt>;
}

/// Logs instead of publishing; used when no endpoint is configured.
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, draft: &ArticleDraft, cover: Option<&CoverImage>) -> Result<PublishReceipt> {
        info!(
            target: "batch",
            title = %draft.title,
            author = %draft.author_id,
            has_cover = cover.is_some(),
            "dry run: article not published"
        );
        Ok(PublishReceipt::default())
    }
}

/// Multipart POST to the publish endpoint with a bearer token.
pub struct HttpPublisher {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpPublisher {
    pub fn new(endpoint: &str, token: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building publish http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.map(str::to_string),
        })
    }
}

#[derive(Deserialize, Default)]
struct PublishBody {
    #[serde(default, alias = "_id")]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "link")]
    url: Option<String>,
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, draft: &ArticleDraft, cover: Option<&CoverImage>) -> Result<PublishReceipt> {
        let mut form = Form::new()
            .text("title", draft.title.clone())
            .text("excerpt", draft.excerpt.clone())
            .text("content", draft.content_html.clone())
            .text("category", draft.category.clone())
            .text("tags", serde_json::to_string(&draft.tags)?)
            .text("author", draft.author_id.clone());
        if let Some(img) = cover {
            let part = Part::bytes(img.bytes.clone())
                .file_name(img.file_name())
                .mime_str(&img.content_type)
                .context("cover image mime type")?;
            form = form.part("cover_image", part);
        }

        let mut req = self.http.post(&self.endpoint).multipart(form);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let resp = req.send().await.context("publish request failed")?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(anyhow!("publish HTTP {}: {}", status.as_u16(), snippet));
        }

        let body: PublishBody = serde_json::from_str(&text).unwrap_or_default();
        Ok(PublishReceipt {
            status: status.as_u16(),
            id: body.id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            url: body.url,
        })
    }
}
