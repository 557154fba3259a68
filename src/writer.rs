// src/writer.rs
//! Article generation: prompt assembly, LLM call, and parsing of the labelled reply.

use std::fmt::Write as _;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::AgentConfig;
use crate::llm::DynLlmClient;
use crate::selector::SelectedTopic;

/// First line of every article prompt, followed by the topic title.
pub const TOPIC_LINE_PREFIX: &str = "Write a news article about the trending topic: ";

const MAX_TAGS: usize = 8;
const EXCERPT_MAX_CHARS: usize = 220;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedArticle {
    pub title: String,
    pub excerpt: String,
    pub content_html: String,
    pub category: String,
    pub tags: Vec<String>,
}

pub struct ContentWriter {
    llm: DynLlmClient,
}

impl ContentWriter {
    pub fn new(llm: DynLlmClient) -> Self {
        Self { llm }
    }

    pub async fn write(&self, agent: &AgentConfig, topic: &SelectedTopic) -> Result<GeneratedArticle> {
        let system = if agent.persona.trim().is_empty() {
            format!("You are {}, a news writer for a digital outlet.", agent.name)
        } else {
            agent.persona.clone()
        };
        let prompt = build_article_prompt(agent, topic);
        let reply = self
            .llm
            .generate(&system, &prompt)
            .await
            .with_context(|| format!("generating article on {:?}", topic.topic.title))?;
        parse_article(&reply, &agent.category_or_default())
    }
}

pub fn build_article_prompt(agent: &AgentConfig, selected: &SelectedTopic) -> String {
    let t = &selected.topic;
    let mut p = String::new();
    let _ = writeln!(p, "{TOPIC_LINE_PREFIX}{}", t.title);
    if t.query != t.title {
        let _ = writeln!(p, "Search query: {}", t.query);
    }
    if !t.categories.is_empty() {
        let _ = writeln!(p, "Trend categories: {}", t.categories.join(", "));
    }
    if let Some(v) = t.search_volume {
        let _ = writeln!(p, "Search volume: {v}");
    }
    if let Some(j) = &selected.justification {
        let _ = writeln!(p, "Editorial angle: {j}");
    }
    let _ = writeln!(p, "Section: {}", agent.category_or_default());
    let _ = write!(
        p,
        "\nReply using exactly these labels:\n\
         TITLE: <headline>\n\
         EXCERPT: <one or two sentence summary>\n\
         CATEGORY: <section>\n\
         TAGS: <comma separated tags>\n\
         CONTENT:\n<article body, paragraphs separated by blank lines>"
    );
    p
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Excerpt,
    Category,
    Tags,
    Content,
}

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\s*#]*(title|t[ií]tulo|excerpt|summary|resumen|bajada|category|categor[ií]a|tags|etiquetas|content|contenido|cuerpo)[\s*]*:[\s*]*(.*)$",
    )
    .expect("label regex")
});

fn section_of(label: &str) -> Section {
    match label.to_lowercase().as_str() {
        "title" | "titulo" | "título" => Section::Title,
        "excerpt" | "summary" | "resumen" | "bajada" => Section::Excerpt,
        "category" | "categoria" | "categoría" => Section::Category,
        "tags" | "etiquetas" => Section::Tags,
        _ => Section::Content,
    }
}

/// Parse a labelled reply. Title and content are required.
pub fn parse_article(reply: &str, fallback_category: &str) -> Result<GeneratedArticle> {
    let mut title = String::new();
    let mut excerpt = String::new();
    let mut category = String::new();
    let mut tags_raw = String::new();
    let mut content = String::new();
    let mut current: Option<Section> = None;

    for line in reply.lines() {
        // Once inside CONTENT, everything else is body text.
        if current != Some(Section::Content) {
            if let Some(caps) = RE_LABEL.captures(line) {
                let section = section_of(&caps[1]);
                current = Some(section);
                let rest = caps[2].trim();
                if !rest.is_empty() {
                    push_line(field(section, &mut title, &mut excerpt, &mut category, &mut tags_raw, &mut content), rest);
                }
                continue;
            }
        }
        if let Some(section) = current {
            let target = field(section, &mut title, &mut excerpt, &mut category, &mut tags_raw, &mut content);
            if section == Section::Content {
                target.push_str(line);
                target.push('\n');
            } else if !line.trim().is_empty() {
                push_line(target, line.trim());
            }
        }
    }

    let title = clean_inline(&title);
    let content = content.trim().to_string();
    if title.is_empty() {
        return Err(anyhow!("generated article has no TITLE"));
    }
    if content.is_empty() {
        return Err(anyhow!("generated article has no CONTENT"));
    }

    let mut excerpt = clean_inline(&excerpt);
    if excerpt.is_empty() {
        excerpt = content
            .split("\n\n")
            .next()
            .map(clean_inline)
            .unwrap_or_default();
    }
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        excerpt = excerpt.chars().take(EXCERPT_MAX_CHARS).collect::<String>().trim_end().to_string();
    }

    let category = Some(clean_inline(&category))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| fallback_category.to_string());

    Ok(GeneratedArticle {
        title,
        excerpt,
        content_html: paragraphs_to_html(&content),
        category,
        tags: parse_tags(&tags_raw),
    })
}

fn field<'a>(
    section: Section,
    title: &'a mut String,
    excerpt: &'a mut String,
    category: &'a mut String,
    tags: &'a mut String,
    content: &'a mut String,
) -> &'a mut String {
    match section {
        Section::Title => title,
        Section::Excerpt => excerpt,
        Section::Category => category,
        Section::Tags => tags,
        Section::Content => content,
    }
}

fn push_line(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(if target.ends_with('\n') { '\n' } else { ' ' });
    }
    target.push_str(text);
}

fn clean_inline(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '"' || c == '*' || c == '“' || c == '”')
        .trim()
        .to_string()
}

/// Comma/semicolon separated, `#` stripped, case-insensitive dedup, capped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split([',', ';'])
        .map(|t| t.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(MAX_TAGS)
        .collect()
}

/// Blank-line separated paragraphs as escaped `<p>` blocks. No Markdown handling.
pub fn paragraphs_to_html(text: &str) -> String {
    let mut out = String::new();
    for para in text.split("\n\n") {
        let joined = para.lines().map(str::trim).collect::<Vec<_>>().join(" ");
        let joined = joined.trim();
        if joined.is_empty() {
            continue;
        }
        out.push_str("<p>");
        out.push_str(&html_escape::encode_text(joined));
        out.push_str("</p>\n");
    }
    out.trim_end().to_string()
}
