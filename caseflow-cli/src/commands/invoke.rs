//! caseflow invoke - call a logic function once, outside the server

use std::sync::Arc;

use anyhow::{Context, Result};
use caseflow_runtime::{DylibLoader, LogicDispatcher, LogicRegistry};
use clap::Args;
use serde_json::Value;

use crate::config::ConfigLoader;

/// Arguments for the invoke command
#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Logic name
    pub name: String,

    /// Function to call
    pub function: String,

    /// JSON arguments
    #[arg(default_value = "null")]
    pub args: String,
}

pub fn run(args: InvokeArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let input = parse_args(&args.args)?;

    let registry = Arc::new(LogicRegistry::new(
        &config.plugins.dir,
        Arc::new(DylibLoader),
    ));
    let dispatcher = LogicDispatcher::new(Arc::clone(&registry));

    let outcome = dispatcher.invoke(&args.name, &args.function, input);
    registry.unload_all();

    match outcome? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{} does not expose '{}'", args.name, args.function),
    }
    Ok(())
}

fn parse_args(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("Arguments must be valid JSON")
}
