//! One-shot batch: every enabled agent once, summary printed as JSON.
//!
//! Usage: run_batch [--reset-session] [--agent <id>]...

use anyhow::{bail, Result};

use trend_news_agent::config::{load_agents_default, Settings};
use trend_news_agent::{init_tracing, BatchOptions, Services};

fn parse_args(args: impl Iterator<Item = String>) -> Result<BatchOptions> {
    let mut opts = BatchOptions::default();
    let mut ids = Vec::new();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--reset-session" => opts.reset_session = true,
            "--agent" => match args.next() {
                Some(id) => ids.push(id),
                None => bail!("--agent needs an id"),
            },
            other => bail!("unknown argument: {other}"),
        }
    }
    if !ids.is_empty() {
        opts.agent_ids = Some(ids);
    }
    Ok(opts)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let opts = parse_args(std::env::args().skip(1))?;
    let settings = Settings::from_env();
    let agents = load_agents_default()?;
    let services = Services::from_settings(settings, agents)?;

    let summary = services.run_batch(&opts).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.total > 0 && summary.succeeded == 0 {
        bail!("all {} agents failed", summary.total);
    }
    Ok(())
}
