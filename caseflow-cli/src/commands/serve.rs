//! caseflow serve - run the logic runtime in the foreground
//!
//! Loads every installed logic unit, watches the plugin directory for new
//! versions and optionally keeps it in sync with the package registry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use caseflow_runtime::{DylibLoader, LogicRuntime};
use clap::Args;
use tracing::{info, warn};

use crate::config::{CaseflowConfig, ConfigLoader};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Fetch the latest packages before serving (overrides config)
    #[arg(long)]
    pub fetch: bool,

    /// Re-fetch from the registry every N seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub sync_interval: Option<u64>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let sync_interval = args
        .sync_interval
        .or(config.registry.sync_interval_secs)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    info!(
        dir = %config.plugins.dir.display(),
        registry = %config.registry.url(),
        "Starting caseflow runtime"
    );
    let runtime = start_runtime(&config).await?;

    if args.fetch || config.registry.fetch_on_start {
        sync(&runtime).await;
    }
    report_loaded(&runtime, &config);

    match sync_interval {
        Some(period) => {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => sync(&runtime).await,
                    result = tokio::signal::ctrl_c() => {
                        result?;
                        break;
                    }
                }
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    info!("Shutting down");
    stop_runtime(runtime).await
}

/// Start the runtime on a blocking thread
///
/// Startup opens every installed library and runs its load hook.
async fn start_runtime(config: &CaseflowConfig) -> Result<LogicRuntime> {
    let runtime_config = config.runtime_config();
    tokio::task::spawn_blocking(move || {
        LogicRuntime::start(runtime_config, Arc::new(DylibLoader))
    })
    .await?
    .context("Failed to start logic runtime")
}

async fn stop_runtime(runtime: LogicRuntime) -> Result<()> {
    tokio::task::spawn_blocking(move || runtime.shutdown()).await?;
    Ok(())
}

async fn sync(runtime: &LogicRuntime) {
    if !runtime.fetcher().fetch(None, None).await {
        warn!("Some packages could not be fetched");
    }
}

fn report_loaded(runtime: &LogicRuntime, config: &CaseflowConfig) {
    let names = runtime.registry().loaded_names();
    if names.is_empty() {
        info!(dir = %config.plugins.dir.display(), "No logic loaded yet");
    } else {
        info!(count = names.len(), logics = %names.join(", "), "Logic ready");
    }
}
