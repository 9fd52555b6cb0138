//! caseflow fetch - install packages from the registry

use anyhow::{Result, bail};
use caseflow_runtime::{Fetcher, FetcherConfig};
use clap::Args;

use crate::config::ConfigLoader;

/// Arguments for the fetch command
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Package to fetch (all packages when omitted)
    pub name: Option<String>,

    /// Exact version to fetch (latest when omitted)
    #[arg(long, requires = "name")]
    pub version: Option<String>,
}

pub async fn run(args: FetchArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let fetcher = Fetcher::new(FetcherConfig::new(
        config.registry.url(),
        &config.plugins.dir,
    ));

    if !fetcher
        .fetch(args.name.as_deref(), args.version.as_deref())
        .await
    {
        bail!("Fetch incomplete; see the log for failed packages");
    }

    println!("Packages up to date in {}", config.plugins.dir.display());
    Ok(())
}
