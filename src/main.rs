//! Sumi-Atlas main entry point
//!
//! This is the command-line interface for the Sumi-Atlas component archiver.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_atlas::analyzer::PageAnalyzer;
use sumi_atlas::config::{load_config_with_hash, Config};
use sumi_atlas::enrichment::{
    convert_component, explain_component, EnrichmentError, HttpEnrichmentGateway,
};
use sumi_atlas::fetcher::{BrowserFetcher, PageFetcher};
use sumi_atlas::ingest::ingest_with_depth;
use sumi_atlas::output::{
    load_statistics, print_archives, print_components, print_explanation, print_statistics,
};
use sumi_atlas::queue::CrawlQueue;
use sumi_atlas::state::ComponentType;
use sumi_atlas::storage::{open_storage, ComponentFilter, Storage};
use sumi_atlas::worker::Worker;
use sumi_atlas::WorkerPool;
use tracing_subscriber::EnvFilter;

/// Sumi-Atlas: a UI component atlas builder
///
/// Sumi-Atlas renders a site's root page in a headless browser, picks out
/// navigation bars, heroes, cards, buttons and footers, and archives clean
/// copies of them in SQLite for browsing and documentation.
#[derive(Parser, Debug)]
#[command(name = "sumi-atlas")]
#[command(version)]
#[command(about = "A UI component atlas builder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Submit a root URL for crawling (repeatable)
    #[arg(long, value_name = "URL")]
    ingest: Vec<String>,

    /// Link depth recorded on ingested jobs
    #[arg(long, default_value_t = 0)]
    depth: u32,

    /// Keep workers running until Ctrl-C instead of exiting once the queue is empty
    #[arg(long)]
    serve: bool,

    /// Validate config and show the rule table without crawling
    #[arg(long, conflicts_with_all = ["serve", "stats"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// List site archives, most recently updated first
    #[arg(long)]
    list_archives: bool,

    /// List stored components
    #[arg(long)]
    list_components: bool,

    /// Only list components of this type (nav, hero, card, button, footer, unknown)
    #[arg(long = "type", value_name = "TYPE", requires = "list_components")]
    component_type: Option<String>,

    /// Only list components carrying this tag
    #[arg(long, requires = "list_components")]
    tag: Option<String>,

    /// Only list components whose name contains this text
    #[arg(long, requires = "list_components")]
    search: Option<String>,

    /// Only list favorite components
    #[arg(long, requires = "list_components")]
    favorites: bool,

    /// Mark a component as favorite
    #[arg(long, value_name = "ID")]
    favorite: Option<i64>,

    /// Remove a component from favorites
    #[arg(long, value_name = "ID")]
    unfavorite: Option<i64>,

    /// Generate and store documentation for a component
    #[arg(long, value_name = "ID")]
    explain: Option<i64>,

    /// Generate and store React code for a component
    #[arg(long, value_name = "ID")]
    convert: Option<i64>,
}

impl Cli {
    /// True when the invocation only reads or edits stored data
    fn is_query(&self) -> bool {
        self.stats
            || self.list_archives
            || self.list_components
            || self.favorite.is_some()
            || self.unfavorite.is_some()
            || self.explain.is_some()
            || self.convert.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let queue = CrawlQueue::new(storage).with_lease(config.worker.job_lease());

    for url in &cli.ingest {
        match ingest_with_depth(&queue, url, cli.depth) {
            Ok(receipt) => println!(
                "Queued {} (archive #{}, job #{})",
                receipt.root_url, receipt.archive_id, receipt.job_id
            ),
            Err(e) => {
                tracing::error!("Failed to ingest {}: {}", url, e);
                return Err(e.into());
            }
        }
    }

    if cli.is_query() {
        handle_queries(&cli, &config, &queue).await?;
        if cli.ingest.is_empty() && !cli.serve {
            return Ok(());
        }
    }

    let worker = build_worker(&config, queue);
    if cli.serve {
        handle_serve(&config, worker).await?;
    } else {
        let summary = WorkerPool::run_until_idle(config.worker.count, worker).await;
        println!(
            "Crawls finished: {} completed, {} failed",
            summary.completed, summary.failed
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_atlas=info,warn"),
            1 => EnvFilter::new("sumi_atlas=debug,info"),
            2 => EnvFilter::new("sumi_atlas=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_worker(config: &Config, queue: CrawlQueue) -> Worker {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(BrowserFetcher::new(config.fetcher.clone()));
    let analyzer = PageAnalyzer::new(&config.analyzer.rule_table());
    Worker::new(queue, fetcher, analyzer)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Atlas Dry Run ===\n");

    println!("Fetcher:");
    println!("  Navigation timeout: {}ms", config.fetcher.navigation_timeout_ms);
    println!("  Network idle window: {}ms", config.fetcher.network_idle_ms);
    println!("  Headless: {}", config.fetcher.headless);
    println!(
        "  Window: {}x{}",
        config.fetcher.window_width, config.fetcher.window_height
    );

    println!("\nWorkers:");
    println!("  Count: {}", config.worker.count);
    println!("  Poll interval: {}ms", config.worker.poll_interval_ms);
    println!("  Job lease: {}ms", config.worker.job_lease_ms);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    match &config.enrichment {
        Some(enrichment) => println!("\nEnrichment endpoint: {}", enrichment.endpoint),
        None => println!("\nEnrichment: not configured"),
    }

    let table = config.analyzer.rule_table();
    println!("\nComponent kinds ({}):", table.len());
    for (kind, rule) in table.iter() {
        println!(
            "  - {} (tags: {}; keywords: {})",
            kind,
            rule.tags.join(", "),
            rule.keywords.join(", ")
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles read and edit modes against the stored atlas
async fn handle_queries(
    cli: &Cli,
    config: &Config,
    queue: &CrawlQueue,
) -> Result<(), Box<dyn std::error::Error>> {
    if cli.stats {
        println!("Database: {}\n", config.output.database_path);
        let stats = load_statistics(&*queue.storage())?;
        print_statistics(&stats);
    }

    if cli.list_archives {
        let archives = queue.storage().list_archives()?;
        print_archives(&archives);
    }

    if cli.list_components {
        let component_type = match &cli.component_type {
            Some(label) => Some(parse_component_type(label)?),
            None => None,
        };
        let filter = ComponentFilter {
            favorite: cli.favorites.then_some(true),
            component_type,
            search: cli.search.clone(),
            tag: cli.tag.clone(),
            ..Default::default()
        };
        let components = queue.storage().list_components(&filter)?;
        print_components(&components);
    }

    if let Some(id) = cli.favorite {
        queue.storage().set_favorite(id, true)?;
        println!("Component #{} marked as favorite", id);
    }

    if let Some(id) = cli.unfavorite {
        queue.storage().set_favorite(id, false)?;
        println!("Component #{} removed from favorites", id);
    }

    if cli.explain.is_some() || cli.convert.is_some() {
        let settings = config
            .enrichment
            .as_ref()
            .ok_or(EnrichmentError::NotConfigured)?;
        let gateway = HttpEnrichmentGateway::new(settings)?;

        if let Some(id) = cli.explain {
            let explanation = explain_component(queue, &gateway, id).await?;
            print_explanation(&explanation);
        }

        if let Some(id) = cli.convert {
            let code = convert_component(queue, &gateway, id).await?;
            println!("{}", code);
        }
    }

    Ok(())
}

/// Handles the --serve mode: runs workers until Ctrl-C
async fn handle_serve(config: &Config, worker: Worker) -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::start(config.worker.count, worker, config.worker.poll_interval());
    tracing::info!("Serving with {} workers; press Ctrl-C to stop", pool.size());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, waiting for in-flight jobs");

    let summary = pool.shutdown().await;
    println!(
        "Crawls finished: {} completed, {} failed",
        summary.completed, summary.failed
    );
    Ok(())
}

fn parse_component_type(label: &str) -> Result<ComponentType, String> {
    ComponentType::all()
        .into_iter()
        .find(|t| t.to_db_string().eq_ignore_ascii_case(label.trim()))
        .ok_or_else(|| format!("unknown component type '{}'", label))
}
