mod search;

use clap::{Parser, Subcommand};
use lotfinder_core::Platform;
use tracing_subscriber::EnvFilter;

use crate::search::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "lotfinder")]
#[command(about = "Wholesale marketplace listing finder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search one marketplace and print the listings as JSON
    Search(SearchArgs),
    /// Look up the product photo on a single detail page
    ResolveImage {
        /// alibaba, 1688, made-in-china, or yiwugo
        platform: Platform,
        /// Detail page URL
        url: String,
    },
    /// Print the effective configuration (cookies redacted)
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = lotfinder_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search(args) => search::run_search(&config, args).await,
        Commands::ResolveImage { platform, url } => {
            search::run_resolve_image(&config, platform, &url).await
        }
        Commands::Config => {
            println!("{config:#?}");
            Ok(())
        }
    }
}
