//! LLM adapter: provider abstraction for persona + prompt text generation.
//!
//! Used by the topic advisor and the content writer. The concrete provider is
//! chosen from settings and environment.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::advisor::CANDIDATES_HEADER;
use crate::writer::TOPIC_LINE_PREFIX;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate text for `prompt` under the `system` persona.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Factory.
///
/// * `LLM_TEST_MODE=mock` → deterministic mock answering advisor and writer
///   prompts in their expected format.
/// * No API key → disabled client (every call fails).
/// * Otherwise the OpenAI chat-completions provider.
pub fn build_llm_client(api_key: Option<&str>, model: Option<&str>) -> Result<DynLlmClient> {
    if std::env::var("LLM_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockLlm::new(Vec::new())));
    }

    match api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Ok(Arc::new(OpenAiClient::new(key, model)?)),
        None => Ok(Arc::new(DisabledLlm)),
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI provider (Chat Completions API).
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model_override: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trend-news-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building llm http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model_override.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("llm request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("llm HTTP {}: {}", status.as_u16(), truncate(&body, 300));
        }

        let body: Resp = resp.json().await.context("parsing llm response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            bail!("llm returned empty content");
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Fails every call; used when no API key is configured.
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(anyhow!("llm disabled: no API key configured"))
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Replays queued responses in order and records every prompt.
/// With an empty queue it answers with `fallback`, or by role when none is set.
pub struct MockLlm {
    queue: Mutex<Vec<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    fallback: Option<String>,
}

impl MockLlm {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        let mut queue = responses;
        queue.reverse();
        Self {
            queue: Mutex::new(queue),
            prompts: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock prompts poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("mock prompts poisoned")
            .push(prompt.to_string());
        let next = self.queue.lock().expect("mock queue poisoned").pop();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(self
                .fallback
                .clone()
                .unwrap_or_else(|| canned_reply(prompt))),
        }
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Role-shaped answer: advisor prompts get their first candidate,
/// article prompts get a labelled article about the topic.
fn canned_reply(prompt: &str) -> String {
    if let Some((_, list)) = prompt.split_once(CANDIDATES_HEADER) {
        let first = list.lines().map(str::trim).find_map(|l| {
            let (pos, title) = l.split_once(". ")?;
            pos.parse::<usize>().ok().map(|p| (p, strip_candidate_suffix(title)))
        });
        if let Some((pos, title)) = first {
            return format!("POSITION: {pos}\nTITLE: {title}\nREASON: mock");
        }
    }
    if let Some(topic) = prompt.lines().find_map(|l| l.strip_prefix(TOPIC_LINE_PREFIX)) {
        let topic = topic.trim();
        return format!(
            "TITLE: {topic}\nEXCERPT: Mock summary of {topic}.\nTAGS: {topic}, mock\nCONTENT:\nMock article about {topic}.\n\nGenerated offline."
        );
    }
    "mock response".to_string()
}

/// "Boca (5000 searches) [Sports]" → "Boca"
fn strip_candidate_suffix(line: &str) -> &str {
    let mut s = line.trim();
    if s.ends_with(']') {
        if let Some((head, _)) = s.rsplit_once(" [") {
            s = head;
        }
    }
    if s.ends_with(" searches)") {
        if let Some((head, _)) = s.rsplit_once(" (") {
            s = head;
        }
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_in_order_then_falls_back() {
        let m = MockLlm::new(vec![Ok("one".into()), Err("boom".into())]).with_fallback("rest");
        assert_eq!(m.generate("s", "p1").await.unwrap(), "one");
        assert!(m.generate("s", "p2").await.is_err());
        assert_eq!(m.generate("s", "p3").await.unwrap(), "rest");
        assert_eq!(m.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn mock_answers_advisor_and_writer_prompts() {
        use crate::advisor::parse_advice;
        use crate::writer::parse_article;

        let m = MockLlm::new(Vec::new());
        let advice_prompt = format!(
            "Writer: Laura\n\n{CANDIDATES_HEADER}\n2. Dólar blue (5000 searches) [Economía]\n4. Boca\n"
        );
        let pick = parse_advice(&m.generate("s", &advice_prompt).await.unwrap()).unwrap();
        assert_eq!(pick.position, 2);
        assert_eq!(pick.title, "Dólar blue");

        let article_prompt = format!("{TOPIC_LINE_PREFIX}Dólar blue\nSection: Economía");
        let reply = m.generate("s", &article_prompt).await.unwrap();
        let article = parse_article(&reply, "Economía").unwrap();
        assert_eq!(article.title, "Dólar blue");
        assert_eq!(article.category, "Economía");
        assert!(article.content_html.contains("Mock article about Dólar blue."));

        assert_eq!(m.generate("s", "anything else").await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn disabled_client_errors() {
        let err = DisabledLlm.generate("s", "p").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
