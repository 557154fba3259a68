pub mod discord;

use tracing::warn;

use crate::batch::BatchSummary;
use crate::notify::discord::DiscordNotifier;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPayload {
    pub headline: String,      // "Batch: 3/4 published"
    pub lines: Vec<String>,    // one per agent (short)
    pub timestamp_iso: String, // UTC RFC 3339
}

impl From<&BatchSummary> for SummaryPayload {
    fn from(s: &BatchSummary) -> Self {
        use crate::batch::AgentStatus;
        let lines = s
            .outcomes
            .iter()
            .map(|o| match &o.status {
                AgentStatus::Published { title, position, .. } => {
                    format!("✅ {} - #{} {}", o.agent_name, position, title)
                }
                AgentStatus::Failed { stage, message } => {
                    format!("❌ {} - {:?}: {}", o.agent_name, stage, message)
                }
            })
            .collect();
        Self {
            headline: format!("Batch: {}/{} published", s.succeeded, s.total),
            lines,
            timestamp_iso: s.finished_at.to_rfc3339(),
        }
    }
}

/// Fan-out for batch summaries; disabled channels are skipped.
#[derive(Clone, Default)]
pub struct BatchNotifier {
    discord: Option<DiscordNotifier>,
}

impl BatchNotifier {
    pub fn new(discord_webhook: Option<&str>) -> Self {
        Self {
            discord: discord_webhook.map(|w| DiscordNotifier::new(w.to_string())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.discord.is_some()
    }

    /// Best-effort: failures are logged, never returned.
    pub async fn notify(&self, summary: &BatchSummary) {
        let Some(discord) = &self.discord else {
            tracing::debug!("batch notifications disabled (no DISCORD_WEBHOOK_URL)");
            return;
        };
        let payload = SummaryPayload::from(summary);
        if let Err(e) = discord.send_summary(&payload).await {
            warn!(target: "batch", error = %e, "discord summary failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{AgentOutcome, AgentStatus, Stage};
    use chrono::Utc;

    #[test]
    fn payload_lists_each_agent() {
        let s = BatchSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total: 2,
            succeeded: 1,
            failed: 1,
            outcomes: vec![
                AgentOutcome {
                    agent_id: "eco".into(),
                    agent_name: "Laura".into(),
                    status: AgentStatus::Published {
                        title: "Dólar récord".into(),
                        topic: "dólar blue".into(),
                        position: 2,
                        widened: false,
                        has_cover: true,
                        article_id: Some("77".into()),
                    },
                },
                AgentOutcome {
                    agent_id: "dep".into(),
                    agent_name: "Martín".into(),
                    status: AgentStatus::Failed {
                        stage: Stage::Selection,
                        message: "rate limited".into(),
                    },
                },
            ],
        };
        let p = SummaryPayload::from(&s);
        assert_eq!(p.headline, "Batch: 1/2 published");
        assert!(p.lines[0].contains("#2 Dólar récord"));
        assert!(p.lines[1].contains("Selection: rate limited"));
        assert!(!BatchNotifier::new(None).is_enabled());
    }
}
