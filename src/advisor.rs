//! Ranking advice: asks the LLM which filtered candidate an agent should cover.
//!
//! Expected reply (field names also accepted in Spanish):
//! ```text
//! POSITION: 3
//! TITLE: dólar blue
//! REASON: one or more lines of justification
//! ```

use std::fmt::Write as _;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::llm::DynLlmClient;
use crate::selector::Candidate;

/// Line that introduces the numbered candidate list in advisor prompts.
pub const CANDIDATES_HEADER: &str = "Trending topics (position. title):";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorPick {
    pub position: usize,
    pub title: String,
    pub justification: String,
}

/// What the advisor knows about the acting agent.
#[derive(Debug, Clone, Default)]
pub struct AdvisorContext {
    pub agent_name: String,
    pub persona: String,
    pub focus_categories: Vec<String>,
    pub recent_titles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("advisory call failed: {0:#}")]
    Call(anyhow::Error),
    #[error("unparseable advisory response: {0}")]
    Unparseable(String),
}

#[async_trait]
pub trait TopicAdvisor: Send + Sync {
    async fn choose(
        &self,
        candidates: &[Candidate],
        ctx: &AdvisorContext,
    ) -> Result<AdvisorPick, AdviceError>;
}

const ADVISOR_SYSTEM: &str = "You are the editor-in-chief of a digital news outlet. \
Pick the single trending topic that best fits the writer and has not been covered yet. \
Answer with exactly three lines: POSITION: <number>, TITLE: <topic title>, REASON: <one sentence>.";

pub struct LlmTopicAdvisor {
    llm: DynLlmClient,
}

impl LlmTopicAdvisor {
    pub fn new(llm: DynLlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl TopicAdvisor for LlmTopicAdvisor {
    async fn choose(
        &self,
        candidates: &[Candidate],
        ctx: &AdvisorContext,
    ) -> Result<AdvisorPick, AdviceError> {
        let prompt = build_advisor_prompt(candidates, ctx);
        let reply = self
            .llm
            .generate(ADVISOR_SYSTEM, &prompt)
            .await
            .map_err(AdviceError::Call)?;
        parse_advice(&reply)
    }
}

pub fn build_advisor_prompt(candidates: &[Candidate], ctx: &AdvisorContext) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Writer: {}", ctx.agent_name);
    if !ctx.persona.is_empty() {
        let _ = writeln!(p, "Profile: {}", ctx.persona);
    }
    if !ctx.focus_categories.is_empty() {
        let _ = writeln!(p, "Preferred sections: {}", ctx.focus_categories.join(", "));
    }
    if !ctx.recent_titles.is_empty() {
        let _ = writeln!(p, "Recently published by this writer (avoid repeating):");
        for t in &ctx.recent_titles {
            let _ = writeln!(p, "- {t}");
        }
    }
    let _ = writeln!(p, "\n{CANDIDATES_HEADER}");
    for c in candidates {
        let _ = write!(p, "{}. {}", c.position, c.topic.title);
        if let Some(v) = c.topic.search_volume {
            let _ = write!(p, " ({v} searches)");
        }
        if !c.topic.categories.is_empty() {
            let _ = write!(p, " [{}]", c.topic.categories.join(", "));
        }
        p.push('\n');
    }
    let _ = write!(
        p,
        "\nChoose one. Reply with POSITION, TITLE and REASON lines only."
    );
    p
}

static RE_POSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[\s*#>-]*(?:position|posici[oó]n)[\s*]*[:=\-][\s*#]*(\d+)")
        .expect("position regex")
});
static RE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[\s*#>-]*(?:title|t[ií]tulo|topic|tema)[\s*]*[:=\-][\s*]*(.+)$")
        .expect("title regex")
});
static RE_REASON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ims)^[\s*#>-]*(?:reason|raz[oó]n|justification|justificaci[oó]n)[\s*]*[:=\-][\s*]*(.+)",
    )
    .expect("reason regex")
});

/// Strict parse: both POSITION and TITLE must be present.
pub fn parse_advice(reply: &str) -> Result<AdvisorPick, AdviceError> {
    let position = RE_POSITION
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .ok_or_else(|| AdviceError::Unparseable(format!("no POSITION in {:?}", snippet(reply))))?;

    let title = RE_TITLE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| clean_field(m.as_str()))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AdviceError::Unparseable(format!("no TITLE in {:?}", snippet(reply))))?;

    let justification = RE_REASON
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    Ok(AdvisorPick {
        position,
        title,
        justification,
    })
}

fn clean_field(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c == '`' || c == '“' || c == '”')
        .trim()
        .to_string()
}

fn snippet(s: &str) -> String {
    s.chars().take(120).collect()
}
