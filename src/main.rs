//! Leadscout main entry point
//!
//! Operator CLI for the contact crawler: start a crawl session and watch it
//! run, list an owner's sessions, inspect one session, or delete one.

use anyhow::Context;
use clap::Parser;
use leadscout::config::load_config;
use leadscout::extraction::OpenAiExtractor;
use leadscout::session::{SessionManager, SessionStatus};
use leadscout::store::open_store;
use leadscout::{CrawlRequest, CrawlService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Leadscout: a bounded contact crawler
///
/// Crawls a single site up to a depth and page budget, extracts contact
/// records through a classification model, and records progress in a local
/// session store.
#[derive(Parser, Debug)]
#[command(name = "leadscout")]
#[command(version = "1.0.0")]
#[command(about = "A bounded contact crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Owner whose sessions are addressed
    #[arg(long, default_value = "local")]
    owner: String,

    /// Start a crawl from this URL and watch it run
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Recursion depth for a new crawl (max 3)
    #[arg(long, default_value_t = 2)]
    depth: u32,

    /// Page budget for a new crawl (max 50)
    #[arg(long, default_value_t = 10)]
    max_pages: u32,

    /// List sessions for the owner and exit
    #[arg(long, conflicts_with_all = ["start_url", "show", "delete"])]
    jobs: bool,

    /// Print one session as JSON and exit
    #[arg(long, value_name = "SESSION_ID", conflicts_with_all = ["start_url", "delete"])]
    show: Option<String>,

    /// Delete one session and exit
    #[arg(long, value_name = "SESSION_ID", conflicts_with = "start_url")]
    delete: Option<String>,

    /// Listing page number
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Listing page size
    #[arg(long, default_value_t = 7)]
    page_size: usize,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let store = open_store(std::path::Path::new(&config.store.database_path))
        .context("failed to open session store")?;

    if cli.jobs {
        handle_jobs(&store, &cli)?;
    } else if let Some(session_id) = &cli.show {
        handle_show(&store, &cli.owner, session_id)?;
    } else if let Some(session_id) = &cli.delete {
        handle_delete(&store, &cli.owner, session_id)?;
    } else if let Some(start_url) = &cli.start_url {
        handle_crawl(&config, store, &cli, start_url).await?;
    } else {
        anyhow::bail!("nothing to do: pass --start-url, --jobs, --show or --delete");
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("leadscout=info,warn"),
            1 => EnvFilter::new("leadscout=debug,info"),
            2 => EnvFilter::new("leadscout=trace,debug"),
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

/// Handles --jobs: paginated session listing, newest first
fn handle_jobs(store: &leadscout::SharedStore, cli: &Cli) -> anyhow::Result<()> {
    let manager = SessionManager::new(store.clone());
    let jobs = manager.list_jobs(&cli.owner, cli.page, cli.page_size)?;

    println!(
        "Sessions for {} (page {}/{}, {} total):\n",
        cli.owner,
        jobs.page,
        jobs.total_pages.max(1),
        jobs.total
    );

    for item in &jobs.items {
        println!(
            "  {}  [{}]  pages={} contacts={} unique={}  {}",
            item.session_id,
            item.status,
            item.progress.pages_visited,
            item.progress.total_contacts,
            item.progress.unique_contacts,
            item.start_url
        );
    }

    if jobs.items.is_empty() {
        println!("  (none)");
    }

    Ok(())
}

/// Handles --show: prints one full session record as JSON
fn handle_show(
    store: &leadscout::SharedStore,
    owner: &str,
    session_id: &str,
) -> anyhow::Result<()> {
    let manager = SessionManager::new(store.clone());
    let session = manager.get_session(owner, session_id)?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

/// Handles --delete
fn handle_delete(
    store: &leadscout::SharedStore,
    owner: &str,
    session_id: &str,
) -> anyhow::Result<()> {
    let manager = SessionManager::new(store.clone());
    manager.delete_session(owner, session_id)?;
    println!("Deleted session {}", session_id);
    Ok(())
}

/// Handles the main crawl operation: start a session and watch it run
async fn handle_crawl(
    config: &leadscout::Config,
    store: leadscout::SharedStore,
    cli: &Cli,
    start_url: &str,
) -> anyhow::Result<()> {
    let extractor =
        Arc::new(OpenAiExtractor::new(&config.extractor).context("extractor setup failed")?);
    let service = CrawlService::new(config, store, extractor)?;

    let session_id = service.start_crawl(CrawlRequest {
        owner_id: cli.owner.clone(),
        start_url: start_url.to_string(),
        depth: cli.depth,
        max_pages: cli.max_pages,
    })?;

    println!("Started session {}", session_id);

    // Poll the store the way an API client would: progress and log lines
    // advance monotonically even if the run later fails.
    let mut last_ordinal = 0u32;
    let final_session = loop {
        let session = service.get_results(&cli.owner, &session_id)?;

        for (ordinal, line) in session.logs.range((last_ordinal + 1)..) {
            println!("  [{}] {}", ordinal, line);
            last_ordinal = *ordinal;
        }

        if session.status.is_terminal() {
            break session;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    service.wait(&session_id).await;

    println!(
        "\nSession {} finished: {}",
        session_id, final_session.status
    );
    println!(
        "  pages visited:   {}",
        final_session.progress.pages_visited
    );
    println!(
        "  total contacts:  {}",
        final_session.progress.total_contacts
    );
    println!(
        "  unique contacts: {}",
        final_session.progress.unique_contacts
    );

    if final_session.status == SessionStatus::Completed && !final_session.contacts.is_empty() {
        println!("\nContacts:");
        println!("{}", serde_json::to_string_pretty(&final_session.contacts)?);
    }

    Ok(())
}
