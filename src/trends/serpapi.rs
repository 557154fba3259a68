use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::trends::types::{TrendingTopic, TrendsRequest, TrendsSource};

pub const DEFAULT_TRENDS_API_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Deserialize)]
struct TrendingNowResponse {
    #[serde(default)]
    trending_searches: Vec<TrendingSearch>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendingSearch {
    query: String,
    #[serde(default)]
    search_volume: Option<u64>,
    #[serde(default)]
    increase_percentage: Option<f64>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    start_timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Category {
    name: String,
}

/// "Trending now" endpoint of a SerpApi-compatible search API.
pub struct SerpApiTrendsSource {
    http: reqwest::Client,
    base_url: String,
}

impl SerpApiTrendsSource {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trend-news-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building trends http client")?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_TRENDS_API_URL).to_string(),
        })
    }
}

#[async_trait]
impl TrendsSource for SerpApiTrendsSource {
    async fn fetch_trends(
        &self,
        request: &TrendsRequest,
        credential: &str,
    ) -> Result<Vec<TrendingTopic>> {
        let hours = request.hours.to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("engine", "google_trends_trending_now"),
                ("geo", request.geo.as_str()),
                ("hours", hours.as_str()),
                ("hl", request.language.as_str()),
                ("api_key", credential),
            ])
            .send()
            .await
            .context("trends request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("reading trends body")?;
        if !status.is_success() {
            // The provider puts the useful reason in the JSON `error` field.
            let reason = serde_json::from_str::<TrendingNowResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(anyhow!("HTTP {}: {}", status.as_u16(), reason));
        }

        parse_trending_now(&body, request.count)
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }
}

/// Map a trending-now JSON body to ranked topics (at most `count`).
pub fn parse_trending_now(body: &str, count: usize) -> Result<Vec<TrendingTopic>> {
    let parsed: TrendingNowResponse =
        serde_json::from_str(body).context("parsing trends response")?;
    if let Some(err) = parsed.error {
        return Err(anyhow!(err));
    }

    let topics = parsed
        .trending_searches
        .into_iter()
        .filter(|t| !t.query.trim().is_empty())
        .take(count)
        .map(|t| {
            let title = t.query.trim().to_string();
            TrendingTopic {
                query: title.clone(),
                title,
                search_volume: t.search_volume,
                increase_percentage: t.increase_percentage,
                categories: t.categories.into_iter().map(|c| c.name).collect(),
                start_timestamp: t.start_timestamp,
            }
        })
        .collect();
    Ok(topics)
}
