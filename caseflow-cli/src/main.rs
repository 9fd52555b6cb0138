use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "caseflow", about = "Hot-swappable business logic for case management")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Install logic packages from the registry
    Fetch(commands::fetch::FetchArgs),
    /// Call a logic function once and print the result
    Invoke(commands::invoke::InvokeArgs),
    /// List installed logic packages
    List,
    /// Run the logic runtime and watch for new versions
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Fetch(args) => commands::fetch::run(args).await,
        Commands::Invoke(args) => commands::invoke::run(args),
        Commands::List => commands::list::run(),
        Commands::Serve(args) => commands::serve::run(args).await,
    }
}
