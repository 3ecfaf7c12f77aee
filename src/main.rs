//! Trend harvester: binary entrypoint.
//! Loads configuration, runs every configured target once and persists the
//! run document plus its history copy.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_harvester::config::HarvestConfig;
use trend_harvester::render::StaticPageRenderer;
use trend_harvester::runner::ComboRunner;
use trend_harvester::storage::{ArtifactSink, FsArtifactSink, SnapshotStore};
use trend_harvester::transport::{HttpTransport, Transport};

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_harvester=info,harvest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

async fn run() -> Result<()> {
    let config = HarvestConfig::from_env().context("loading configuration")?;
    tracing::info!(
        target: "harvest",
        strategy = config.strategy.as_str(),
        targets = config.targets().len(),
        data_dir = %config.data_dir.display(),
        "starting run"
    );

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        &config.user_agent,
        config.timeouts.navigation,
    )?);
    let headers = config
        .regions
        .first()
        .map(|r| config.request_headers(r))
        .unwrap_or_default();
    let renderer = Arc::new(StaticPageRenderer::new(transport.clone(), headers));

    let store = SnapshotStore::new(config.data_dir.clone());
    store.ensure_dirs().await?;
    let artifacts: Option<Arc<dyn ArtifactSink>> = config
        .capture_artifacts
        .then(|| Arc::new(FsArtifactSink::new(store.snapshot_dir())) as Arc<dyn ArtifactSink>);

    let runner = ComboRunner::new(config, transport, renderer, artifacts);
    let snapshot = runner.run().await;

    let failed = snapshot.combos.iter().filter(|c| c.error().is_some()).count();
    let items: usize = snapshot.combos.iter().map(|c| c.item_count()).sum();
    let (latest, history) = store.write(&snapshot, Utc::now()).await?;
    tracing::info!(
        target: "harvest",
        combos = snapshot.combos.len(),
        failed,
        items,
        latest = %latest.display(),
        history = %history.display(),
        "run saved"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(target: "harvest", error = %format!("{e:#}"), "run aborted");
        std::process::exit(1);
    }
}
