use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use zotero_feed::config::{self, Config, RepoContext};
use zotero_feed::pipeline::{self, Trigger};
use zotero_feed::schedule;
use zotero_feed::zotero::rest::ZoteroRest;

#[derive(Parser)]
#[command(name = "zotero-feed")]
#[command(version)]
#[command(about = "Regenerates a Zotero group's Atom feed and commits it when it changes")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Repository to write and commit the feed in
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the library and update the feed once
    Run,
    /// Stay resident and run the pipeline daily at 08:00 UTC
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Saved values from .env (real env vars take precedence)
    Config::load_env_file();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ZOTERO_FEED_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("zotero_feed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)?;
    let context = RepoContext::from_env()?;
    let api_key = config::zotero_api_key();

    let mut source = ZoteroRest::new(&config.zotero, api_key)?;

    match cli.command {
        Commands::Run => {
            let outcome =
                pipeline::run_once(&config, &context, &mut source, &cli.repo, Trigger::Manual)
                    .await?;
            if outcome.committed {
                println!(
                    "Committed updated feed ({} entries, {} changed file(s)).",
                    outcome.entries,
                    outcome.changed_paths.len()
                );
            } else {
                println!("Feed already up to date ({} entries).", outcome.entries);
            }
        }
        Commands::Watch => {
            schedule::watch(&config, &context, &mut source, &cli.repo).await?;
        }
    }

    Ok(())
}
