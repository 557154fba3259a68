// src/lib.rs
// Public library surface for both binaries and the integration tests.

pub mod advisor;
pub mod api;
pub mod app;
pub mod articles;
pub mod batch;
pub mod config;
pub mod history;
pub mod images;
pub mod llm;
pub mod metrics;
pub mod notify;
pub mod publish;
pub mod selector;
pub mod session;
pub mod similarity;
pub mod trends;
pub mod writer;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::app::{Collaborators, Services};
pub use crate::batch::{BatchOptions, BatchSummary};
pub use crate::selector::{SelectedTopic, SelectionError, TopicSelector};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed earlier (e.g. by the host runtime) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_news_agent=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
