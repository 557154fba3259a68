//! # Similarity Matcher
//!
//! Decides whether a candidate trend title repeats something an agent has
//! recently published, using Jaccard overlap of "meaningful" tokens.
//!
//! - Tokens: whitespace split, lowercased, punctuation stripped.
//! - Meaningful: at least `min_token_len` chars and not a stop/generic word.
//! - Candidates with fewer than `min_meaningful_tokens` are never judged similar.
//! - Any recent article at or above `threshold` makes the candidate too similar.
//!
//! Permissive on purpose: a missed repeat costs less than a blocked novel topic.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::articles::RecentArticleRef;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.4;
pub const DEFAULT_MIN_TOKEN_LEN: usize = 4;
pub const DEFAULT_MIN_MEANINGFUL_TOKENS: usize = 2;

/// Articles, prepositions, connectors, country names and catch-all section words.
/// Entries shorter than the default min token length only apply when
/// `min_token_len` is lowered.
const STOPWORDS: &[&str] = &[
    // es: connectors / prepositions / pronouns
    "para", "como", "cómo", "sobre", "desde", "hasta", "entre", "contra", "durante", "según",
    "segun", "hacia", "tras", "este", "esta", "esto", "estos", "estas", "ese", "esa", "eso",
    "esos", "esas", "aquel", "pero", "porque", "cuando", "cuándo", "donde", "dónde", "todo",
    "toda", "todos", "todas", "cual", "cuál", "cuales", "quien", "quién", "qué", "sus", "ante",
    "bajo", "luego", "también", "tambien", "muy", "más", "menos", "otro", "otra", "otros",
    "otras", "sido", "será", "sera", "fueron", "están", "estan", "tiene", "tienen", "hace",
    "hacen", "puede", "pueden", "dice", "dijo", "habla",
    // en
    "with", "from", "that", "this", "these", "those", "about", "after", "before", "over",
    "into", "what", "when", "where", "which", "will", "have", "been", "were",
    // geography
    "argentina", "argentino", "argentinos", "chile", "méxico", "mexico", "españa", "espana",
    "uruguay", "paraguay", "colombia", "perú", "peru", "brasil", "bolivia", "venezuela",
    "ecuador", "estados", "unidos", "mundo", "mundial", "país", "pais", "nacional",
    // generic topic words
    "política", "politica", "economía", "economia", "sociedad", "deportes", "cultura",
    "noticias", "noticia", "último", "ultimo", "última", "ultima", "últimas", "ultimas",
    "gobierno", "news", "today", "trending", "tendencia", "tendencias",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityConfig {
    pub threshold: f64,
    pub min_token_len: usize,
    pub min_meaningful_tokens: usize,
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            min_meaningful_tokens: DEFAULT_MIN_MEANINGFUL_TOKENS,
            extra_stopwords: Vec::new(),
        }
    }
}

/// The recent article that tripped the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub article_title: String,
    pub score: f64,
    pub shared: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    cfg: SimilarityConfig,
    stopwords: HashSet<String>,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new(SimilarityConfig::default())
    }
}

impl SimilarityMatcher {
    pub fn new(mut cfg: SimilarityConfig) -> Self {
        cfg.threshold = cfg.threshold.clamp(0.0, 1.0);
        if cfg.min_meaningful_tokens == 0 {
            cfg.min_meaningful_tokens = 1;
        }
        cfg.min_token_len = cfg.min_token_len.max(1);
        let stopwords = STOPWORDS
            .iter()
            .map(|w| w.to_string())
            .chain(cfg.extra_stopwords.iter().map(|w| w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { cfg, stopwords }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.cfg
    }

    /// Meaningful token set of `text`.
    pub fn tokens(&self, text: &str) -> BTreeSet<String> {
        let decoded = html_escape::decode_html_entities(text);
        decoded
            .split_whitespace()
            .map(|raw| {
                raw.chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty() && t.chars().count() >= self.cfg.min_token_len)
            .filter(|t| !self.stopwords.contains(t))
            .collect()
    }

    pub fn is_too_similar(&self, candidate_title: &str, recent: &[RecentArticleRef]) -> bool {
        self.find_similar(candidate_title, recent).is_some()
    }

    /// First recent article whose overlap with the candidate reaches the threshold.
    pub fn find_similar(
        &self,
        candidate_title: &str,
        recent: &[RecentArticleRef],
    ) -> Option<SimilarityHit> {
        let candidate = self.tokens(candidate_title);
        if candidate.len() < self.cfg.min_meaningful_tokens {
            return None;
        }

        recent.iter().find_map(|article| {
            let text = format!("{} {}", article.title, article.excerpt);
            let other = self.tokens(&text);
            let score = jaccard(&candidate, &other);
            if score >= self.cfg.threshold {
                Some(SimilarityHit {
                    article_title: article.title.clone(),
                    score,
                    shared: candidate.intersection(&other).cloned().collect(),
                })
            } else {
                None
            }
        })
    }
}

/// |A ∩ B| / |A ∪ B|; two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    inter as f64 / union as f64
}
