// src/images.rs
//! Cover images: search by query, download the first hit.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_IMAGE_API_URL: &str = "https://api.pexels.com/v1/search";

#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_url: String,
}

impl CoverImage {
    pub fn file_name(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "cover.png",
            "image/webp" => "cover.webp",
            _ => "cover.jpg",
        }
    }
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// `Ok(None)` when the search finds nothing usable.
    async fn find_image(&self, query: &str) -> Result<Option<CoverImage>>;
}

/// Used when no image API key is configured.
pub struct NoImages;

#[async_trait]
impl ImageSource for NoImages {
    async fn find_image(&self, _query: &str) -> Result<Option<CoverImage>> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSrc,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc {
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    original: Option<String>,
}

/// Pexels-compatible photo search.
pub struct PexelsImageSource {
    http: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl PexelsImageSource {
    pub fn new(api_key: &str, search_url: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building image http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            search_url: search_url.unwrap_or(DEFAULT_IMAGE_API_URL).to_string(),
        })
    }
}

#[async_trait]
impl ImageSource for PexelsImageSource {
    async fn find_image(&self, query: &str) -> Result<Option<CoverImage>> {
        let resp = self
            .http
            .get(&self.search_url)
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .send()
            .await
            .context("image search failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("image search HTTP {}", resp.status().as_u16()));
        }
        let body: SearchResp = resp.json().await.context("parsing image search")?;
        let Some(url) = first_photo_url(body) else {
            return Ok(None);
        };

        let img = self
            .http
            .get(&url)
            .send()
            .await
            .context("image download failed")?;
        if !img.status().is_success() {
            return Err(anyhow!("image download HTTP {}", img.status().as_u16()));
        }
        let content_type = img
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = img.bytes().await.context("reading image bytes")?.to_vec();
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(CoverImage {
            bytes,
            content_type,
            source_url: url,
        }))
    }
}

fn first_photo_url(body: SearchResp) -> Option<String> {
    body.photos
        .into_iter()
        .find_map(|p| p.src.large.or(p.src.original))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_large_then_original() {
        let body: SearchResp = serde_json::from_str(
            r#"{"photos":[{"src":{"original":"https://x/o.jpg"}},{"src":{"large":"https://x/l.jpg"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_photo_url(body).as_deref(), Some("https://x/o.jpg"));

        let empty: SearchResp = serde_json::from_str(r#"{"photos":[]}"#).unwrap();
        assert!(first_photo_url(empty).is_none());
    }

    #[test]
    fn file_name_follows_content_type() {
        let mk = |ct: &str| CoverImage {
            bytes: vec![1],
            content_type: ct.into(),
            source_url: String::new(),
        };
        assert_eq!(mk("image/png").file_name(), "cover.png");
        assert_eq!(mk("image/jpeg").file_name(), "cover.jpg");
    }
}
