// src/config/settings.rs
use std::env;

use serde::Serialize;
use tracing::warn;

use crate::similarity::{SimilarityConfig, DEFAULT_MIN_TOKEN_LEN, DEFAULT_SIMILARITY_THRESHOLD};
use crate::trends::cache::DEFAULT_CACHE_TIMEOUT_MINUTES;
use crate::trends::TrendsRequest;

pub const ENV_TRENDS_API_KEY: &str = "TRENDS_API_KEY";
pub const ENV_TRENDS_API_KEY_BACKUP: &str = "TRENDS_API_KEY_BACKUP";

/// Process settings, read from the environment (after `.env`).
/// Secrets are skipped when serialized for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    #[serde(skip)]
    pub trends_api_key: Option<String>,
    #[serde(skip)]
    pub trends_api_key_backup: Option<String>,
    pub trends_api_url: Option<String>,
    pub trends: TrendsRequest,
    pub cache_timeout_minutes: i64,
    pub similarity: SimilarityConfig,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub articles_api_url: Option<String>,
    pub publish_api_url: Option<String>,
    #[serde(skip)]
    pub publish_api_token: Option<String>,
    #[serde(skip)]
    pub image_api_key: Option<String>,
    pub image_api_url: Option<String>,
    #[serde(skip)]
    pub discord_webhook_url: Option<String>,
    pub history_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trends_api_key: None,
            trends_api_key_backup: None,
            trends_api_url: None,
            trends: TrendsRequest::default(),
            cache_timeout_minutes: DEFAULT_CACHE_TIMEOUT_MINUTES,
            similarity: SimilarityConfig::default(),
            openai_api_key: None,
            llm_model: None,
            articles_api_url: None,
            publish_api_url: None,
            publish_api_token: None,
            image_api_key: None,
            image_api_url: None,
            discord_webhook_url: None,
            history_capacity: 50,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup; unparseable numbers fall back to defaults.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Settings::default();
        let text = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let trends = TrendsRequest {
            geo: text("TRENDS_GEO").unwrap_or(d.trends.geo),
            hours: parse_or(&get, "TRENDS_HOURS", d.trends.hours),
            language: text("TRENDS_LANGUAGE").unwrap_or(d.trends.language),
            count: parse_or(&get, "TRENDS_COUNT", d.trends.count).max(1),
        };

        let threshold = parse_or(&get, "SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)
            .clamp(0.0, 1.0);
        let similarity = SimilarityConfig {
            threshold,
            min_token_len: parse_or(&get, "SIMILARITY_MIN_TOKEN_LEN", DEFAULT_MIN_TOKEN_LEN).max(1),
            extra_stopwords: text("SIMILARITY_EXTRA_STOPWORDS")
                .map(|s| {
                    s.split(',')
                        .map(|w| w.trim().to_string())
                        .filter(|w| !w.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            ..SimilarityConfig::default()
        };

        Self {
            trends_api_key: text(ENV_TRENDS_API_KEY),
            trends_api_key_backup: text(ENV_TRENDS_API_KEY_BACKUP),
            trends_api_url: text("TRENDS_API_URL"),
            trends,
            cache_timeout_minutes: parse_or(&get, "TRENDS_CACHE_MINUTES", d.cache_timeout_minutes)
                .max(1),
            similarity,
            openai_api_key: text("OPENAI_API_KEY"),
            llm_model: text("LLM_MODEL"),
            articles_api_url: text("ARTICLES_API_URL"),
            publish_api_url: text("PUBLISH_API_URL"),
            publish_api_token: text("PUBLISH_API_TOKEN"),
            image_api_key: text("IMAGE_API_KEY"),
            image_api_url: text("IMAGE_API_URL"),
            discord_webhook_url: text("DISCORD_WEBHOOK_URL"),
            history_capacity: parse_or(&get, "HISTORY_CAPACITY", d.history_capacity),
        }
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "invalid numeric setting, using default");
                default
            }
        },
    }
}
