mod config;
mod output;
mod state;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use mongomon_collector::{MetricCatalogProvider, MetricSource, MongoStatusCollector};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::AgentConfig::from_cli(config::Cli::parse())?;

    let directive = if config.verbose {
        "mongomon=debug"
    } else {
        "mongomon=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let collector = MongoStatusCollector::new(config.connection(), &config.metric_key_prefix);
    let spec = collector.graph_definitions();

    if output::meta_requested() {
        let meta = output::render_meta(&spec).context("Failed to render graph definitions")?;
        println!("{meta}");
        return Ok(());
    }

    tracing::debug!(
        collector = collector.name(),
        endpoint = %config.connection().endpoint(),
        "Starting collection cycle"
    );
    let metrics = match collector.fetch_metrics().await {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!(error = %e, "Collection failed");
            return Err(e.into());
        }
    };

    let now = Utc::now().timestamp();
    let state_path = config.state_path();
    let previous = state::SampleState::load(&state_path);
    let (lines, next) = output::render_values(&spec, &metrics, previous.as_ref(), now);

    let mut stdout = std::io::stdout().lock();
    for line in &lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;

    next.save(&state_path)?;
    tracing::debug!(count = lines.len(), path = %state_path.display(), "Cycle complete");
    Ok(())
}
