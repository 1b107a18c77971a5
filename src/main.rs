use anyhow::Context;
use clap::{Parser, Subcommand};
use sac_shows::aggregate::{dedupe_and_sort, run_sources, scrape_all_sources};
use sac_shows::config::Config;
use sac_shows::fetch::Fetcher;
use sac_shows::logging;
use sac_shows::server;
use sac_shows::sources::{source_by_slug, supported_slugs, EventSource};
use sac_shows::venues::VenueTable;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "sac_shows")]
#[command(about = "Sacramento live music event aggregator")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scrape pipeline once and emit the aggregated feed as JSON
    Scrape {
        /// Specific sources to run (comma-separated slugs); defaults to the
        /// full registry plus manual events
        #[arg(long)]
        sources: Option<String>,
        /// Write the feed to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the cached aggregate feed over HTTP
    Serve,
}

async fn run_scrape(sources: Option<String>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let fetcher = Fetcher::new();
    let venues = VenueTable::known();

    let events = match sources {
        Some(list) => {
            let mut selected: Vec<Box<dyn EventSource>> = Vec::new();
            for slug in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match source_by_slug(slug) {
                    Some(source) => selected.push(source),
                    None => {
                        warn!(%slug, "unknown source");
                        // Keep stdout clean for the JSON feed
                        eprintln!("Unknown source '{}'. Supported: {}", slug, supported_slugs().join(", "));
                    }
                }
            }
            dedupe_and_sort(run_sources(selected, &fetcher, &venues).await?)
        }
        None => scrape_all_sources(&fetcher, &venues, &config.manual_events_path).await?,
    };

    let payload = serde_json::to_string_pretty(&events)?;
    match output {
        Some(path) => {
            std::fs::write(&path, payload)
                .with_context(|| format!("writing feed to {}", path.display()))?;
            println!("Wrote {} events to {}", events.len(), path.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scrape { sources, output } => run_scrape(sources, output).await?,
        Commands::Serve => {
            let config = Config::load()?;
            server::serve(config).await?;
        }
    }
    Ok(())
}
