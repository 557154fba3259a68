// tests/batch_pipeline.rs
//
// End-to-end batch runs over in-process fakes: topic diversity across agents,
// similarity exclusion, explicit positions, per-agent failure isolation and
// credential rotation.

mod common;

use common::*;
use trend_news_agent::batch::{AgentStatus, Stage};
use trend_news_agent::trends::CredentialSlot;
use trend_news_agent::BatchOptions;

fn published_position(status: &AgentStatus) -> Option<usize> {
    match status {
        AgentStatus::Published { position, .. } => Some(*position),
        _ => None,
    }
}

#[tokio::test]
async fn consecutive_agents_get_distinct_topics_from_one_snapshot() {
    let h = harness(
        vec![agent("a", None), agent("b", None), agent("c", None)],
        FakeTrends::new(TOPICS),
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3, "outcomes: {:?}", summary.outcomes);
    let positions: Vec<_> = summary
        .outcomes
        .iter()
        .filter_map(|o| published_position(&o.status))
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);

    // One upstream call for the whole batch; the rest came from the cache.
    assert_eq!(h.trends.calls(), 1);

    let drafts = h.publisher.published();
    assert_eq!(drafts.len(), 3);
    assert_eq!(drafts[0].0.title, "Nota sobre Dólar blue hoy");
    assert_eq!(drafts[0].0.author_id, "author-a");
    assert!(drafts[0].0.content_html.starts_with("<p>"));
    // image lookup for the Boca topic fails; the article still goes out without a cover
    assert!(drafts[0].1);
    assert!(!drafts[1].1);

    let session = h.services.session.snapshot();
    assert_eq!(session.positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn similar_recent_article_pushes_agent_to_next_topic() {
    let h = harness(
        vec![agent("eco", None)],
        FakeTrends::new(TOPICS),
        FixedArticles::default().with("author-eco", &["Cotización del dólar blue hoy"]),
        EchoLlm { fail_articles_for: None },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(published_position(&summary.outcomes[0].status), Some(2));
}

#[tokio::test]
async fn explicit_positions_are_honored_and_clamped() {
    let h = harness(
        vec![agent("fixed", Some(3)), agent("wild", Some(15))],
        FakeTrends::new(TOPICS),
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    let positions: Vec<_> = summary
        .outcomes
        .iter()
        .filter_map(|o| published_position(&o.status))
        .collect();
    assert_eq!(positions, vec![3, 1]);
}

#[tokio::test]
async fn one_failing_agent_does_not_stop_the_batch() {
    let h = harness(
        vec![agent("a", None), agent("b", None), agent("c", None)],
        FakeTrends::new(TOPICS),
        FixedArticles::default(),
        EchoLlm {
            fail_articles_for: Some("Boca Juniors River Plate".into()),
        },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    match &summary.outcomes[1].status {
        AgentStatus::Failed { stage, message } => {
            assert_eq!(*stage, Stage::Generation);
            assert!(message.contains("model overloaded"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // the topic claimed by the failed agent stays claimed
    assert_eq!(published_position(&summary.outcomes[2].status), Some(3));

    let history = h.services.history.snapshot_last_n(5);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].failed, 1);
    assert_eq!(history[0].failures.len(), 1);
}

#[tokio::test]
async fn rate_limited_primary_rotates_to_backup_and_sticks() {
    let trends = FakeTrends::new(TOPICS).failing_first(&["HTTP 429: Too Many Requests"]);
    let h = harness(
        vec![agent("a", None)],
        trends,
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(
        *h.trends.credentials_seen.lock().unwrap(),
        vec!["primary-key".to_string(), "backup-key".to_string()]
    );
    assert_eq!(h.services.provider.current_slot(), CredentialSlot::Backup);
}

#[tokio::test]
async fn exhausted_credentials_fail_selection_without_panicking() {
    let trends = FakeTrends::new(TOPICS)
        .failing_first(&["Your account has run out of searches.", "429 Too Many Requests"]);
    let h = harness(
        vec![agent("a", None)],
        trends,
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );

    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.failed, 1);
    match &summary.outcomes[0].status {
        AgentStatus::Failed { stage, .. } => assert_eq!(*stage, Stage::Selection),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.trends.calls(), 2);
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn options_filter_agents_and_reset_session() {
    let mut off = agent("off", None);
    off.enabled = false;
    let h = harness(
        vec![agent("a", None), off, agent("b", None)],
        FakeTrends::new(TOPICS),
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );

    let first = h.services.run_batch(&BatchOptions::default()).await;
    assert_eq!(first.total, 2, "disabled agent is skipped");

    let only_b = BatchOptions {
        reset_session: true,
        agent_ids: Some(vec!["b".into()]),
    };
    let second = h.services.run_batch(&only_b).await;
    assert_eq!(second.total, 1);
    assert_eq!(second.outcomes[0].agent_id, "b");
    // after the reset, position 1 is free again
    assert_eq!(published_position(&second.outcomes[0].status), Some(1));
    assert_eq!(h.services.history.snapshot_last_n(10).len(), 2);
}

#[tokio::test]
async fn zero_position_in_roster_file_clamps_to_first_topic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.toml");
    std::fs::write(
        &path,
        r#"
[[agents]]
id = "portada"
name = "Redacción"
author_id = "100"
trend_position = 0
"#,
    )
    .unwrap();
    let roster = trend_news_agent::config::load_agents_from(&path).unwrap();
    assert_eq!(roster[0].trend_position, Some(0));

    // an advisor failure would surface if the zero fell through to it
    let h = harness(
        roster,
        FakeTrends::new(TOPICS),
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );
    let summary = h.services.run_batch(&BatchOptions::default()).await;

    assert_eq!(summary.succeeded, 1, "outcomes: {:?}", summary.outcomes);
    assert_eq!(published_position(&summary.outcomes[0].status), Some(1));
}
