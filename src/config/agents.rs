// src/config/agents.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_AGENTS_PATH: &str = "AGENTS_CONFIG_PATH";

fn default_enabled() -> bool {
    true
}

/// One writer persona. Each agent publishes as its own author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub author_id: String,
    /// System persona handed to the LLM.
    #[serde(default)]
    pub persona: String,
    /// Sections this writer prefers; also shown to the advisor.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub default_category: Option<String>,
    /// Fixed 1-based trend position; `None` lets the advisor choose.
    #[serde(default)]
    pub trend_position: Option<usize>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AgentConfig {
    pub fn category_or_default(&self) -> String {
        self.default_category
            .clone()
            .or_else(|| self.categories.first().cloned())
            .unwrap_or_else(|| "General".to_string())
    }
}

/// Load the roster from an explicit path. Supports TOML or JSON formats.
pub fn load_agents_from(path: &Path) -> Result<Vec<AgentConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading agents from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_agents(&content, ext.as_str())
}

/// Load the roster using env var + fallbacks:
/// 1) $AGENTS_CONFIG_PATH
/// 2) config/agents.toml
/// 3) config/agents.json
pub fn load_agents_default() -> Result<Vec<AgentConfig>> {
    if let Ok(p) = std::env::var(ENV_AGENTS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_agents_from(&pb);
        } else {
            return Err(anyhow!("AGENTS_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/agents.toml");
    if toml_p.exists() {
        return load_agents_from(&toml_p);
    }
    let json_p = PathBuf::from("config/agents.json");
    if json_p.exists() {
        return load_agents_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_agents(s: &str, hint_ext: &str) -> Result<Vec<AgentConfig>> {
    let agents = if hint_ext == "json" {
        parse_json(s)?
    } else if hint_ext == "toml" {
        parse_toml(s)?
    } else {
        parse_toml(s).or_else(|_| parse_json(s))?
    };
    validate(agents)
}

fn parse_toml(s: &str) -> Result<Vec<AgentConfig>> {
    #[derive(Deserialize)]
    struct TomlAgents {
        #[serde(default)]
        agents: Vec<AgentConfig>,
    }
    let v: TomlAgents = toml::from_str(s).context("parsing agents TOML")?;
    Ok(v.agents)
}

fn parse_json(s: &str) -> Result<Vec<AgentConfig>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonAgents {
        Wrapped { agents: Vec<AgentConfig> },
        Bare(Vec<AgentConfig>),
    }
    let v: JsonAgents = serde_json::from_str(s).context("parsing agents JSON")?;
    Ok(match v {
        JsonAgents::Wrapped { agents } => agents,
        JsonAgents::Bare(agents) => agents,
    })
}

/// Trim ids, reject blanks and duplicates. Positions are kept as written;
/// the selector clamps out-of-range ones.
fn validate(items: Vec<AgentConfig>) -> Result<Vec<AgentConfig>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut a in items {
        a.id = a.id.trim().to_string();
        a.author_id = a.author_id.trim().to_string();
        if a.id.is_empty() || a.author_id.is_empty() {
            return Err(anyhow!("agent {:?} needs both id and author_id", a.name));
        }
        if !seen.insert(a.id.clone()) {
            return Err(anyhow!("duplicate agent id {:?}", a.id));
        }
        out.push(a);
    }
    Ok(out)
}
