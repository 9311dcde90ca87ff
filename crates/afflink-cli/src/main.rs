mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "afflink-cli")]
#[command(about = "Find marketplace products and their affiliate links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search the listing and print the top results as JSON.
    Search {
        /// Free-text product query.
        query: String,

        /// Lowest acceptable price; 0 leaves it unbounded.
        #[arg(long, default_value_t = 0)]
        min_price: u64,

        /// Highest acceptable price; 0 leaves it unbounded.
        #[arg(long, default_value_t = 0)]
        max_price: u64,

        /// Concurrent link-extraction workers (overrides `AFFLINK_EXTRACT_WORKERS`).
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        workers: Option<u16>,
    },
    /// Log in to the publisher dashboard and persist the session.
    Login,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let mut config = afflink_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            query,
            min_price,
            max_price,
            workers,
        } => {
            if let Some(workers) = workers {
                config.extract_workers = usize::from(workers);
            }
            commands::run_search(&config, &query, min_price, max_price).await
        }
        Commands::Login => commands::run_login(&config).await,
    }
}
