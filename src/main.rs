//! Trend News Agent - Service Entrypoint
//! Boots the Axum HTTP server with the shared service graph and `/metrics`.
//!
//! See `README.md` for configuration.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};

use trend_news_agent::config::{load_agents_default, Settings};
use trend_news_agent::metrics::Metrics;
use trend_news_agent::{init_tracing, router, Services};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    if settings.trends_api_key.is_none() && settings.trends_api_key_backup.is_none() {
        warn!("no TRENDS_API_KEY configured; topic selection will fail until one is set");
    }

    let agents = load_agents_default()?;
    info!(agents = agents.len(), geo = %settings.trends.geo, "configuration loaded");

    let metrics = Metrics::init(settings.cache_timeout_minutes)?;

    let services = Services::from_settings(settings, agents)?;

    let app = router(Arc::new(services)).merge(metrics.router());
    Ok(app.into())
}
