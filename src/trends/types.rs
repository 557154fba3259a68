// src/trends/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One trending search as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingTopic {
    pub title: String,
    /// Raw search query; usually equal to `title`.
    pub query: String,
    pub search_volume: Option<u64>,
    pub increase_percentage: Option<f64>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub start_timestamp: Option<i64>,
}

impl TrendingTopic {
    /// Topic with only a title; query mirrors the title.
    pub fn titled(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            query: title.clone(),
            title,
            search_volume: None,
            increase_percentage: None,
            categories: Vec::new(),
            start_timestamp: None,
        }
    }
}

/// Which rotating credential produced a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSlot {
    Primary,
    Backup,
}

impl CredentialSlot {
    pub fn index(self) -> usize {
        match self {
            CredentialSlot::Primary => 0,
            CredentialSlot::Backup => 1,
        }
    }

    pub fn from_index(i: usize) -> Self {
        if i == 0 {
            CredentialSlot::Primary
        } else {
            CredentialSlot::Backup
        }
    }

    pub fn other(self) -> Self {
        match self {
            CredentialSlot::Primary => CredentialSlot::Backup,
            CredentialSlot::Backup => CredentialSlot::Primary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialSlot::Primary => "primary",
            CredentialSlot::Backup => "backup",
        }
    }
}

/// One fetched, timestamped batch of ranked topics. Position 1 is `topics[0]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendsSnapshot {
    pub geo: String,
    pub fetched_at: DateTime<Utc>,
    pub topics: Vec<TrendingTopic>,
    pub source_credential: CredentialSlot,
}

impl TrendsSnapshot {
    /// Topic at a 1-based position.
    pub fn at_position(&self, position: usize) -> Option<&TrendingTopic> {
        position.checked_sub(1).and_then(|i| self.topics.get(i))
    }
}

/// Parameters of a trends fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendsRequest {
    pub geo: String,
    pub hours: u32,
    pub language: String,
    pub count: usize,
}

impl Default for TrendsRequest {
    fn default() -> Self {
        Self {
            geo: "AR".to_string(),
            hours: 24,
            language: "es-419".to_string(),
            count: 10,
        }
    }
}

/// Upstream trends data source. Errors are opaque; the rotation layer
/// classifies them from their text.
#[async_trait::async_trait]
pub trait TrendsSource: Send + Sync {
    async fn fetch_trends(
        &self,
        request: &TrendsRequest,
        credential: &str,
    ) -> Result<Vec<TrendingTopic>>;
    fn name(&self) -> &'static str;
}
