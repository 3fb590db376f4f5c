//! wechat-sources main entry point
//!
//! Command-line interface for registering WeChat public accounts and
//! crawling their articles.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing_subscriber::EnvFilter;
use wechat_sources::api::ALL_SOURCES;
use wechat_sources::config::{compute_settings_hash, load_settings};
use wechat_sources::platform::MpClient;
use wechat_sources::registry::RegistryPolicy;
use wechat_sources::session::PromptLogin;
use wechat_sources::setup::{parse_names, register_sources, DEFAULT_FETCH_COUNT};
use wechat_sources::storage::{open_store, SqliteStore};
use wechat_sources::{
    ConfigStore, CrawlOrchestrator, CrawlReport, CrawlScheduler, SessionProvider, Settings,
    SourceOutcome, SourceRegistry,
};

/// wechat-sources: a registry and crawler for WeChat public accounts
#[derive(Parser, Debug)]
#[command(name = "wechat-sources")]
#[command(version = "1.0.0")]
#[command(about = "Register WeChat public accounts and crawl their articles", long_about = None)]
struct Cli {
    /// Path to a TOML settings file
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register accounts by display name
    Add {
        /// Comma-separated account names; prompted for when omitted
        #[arg(long)]
        names: Option<String>,

        /// Articles to fetch per crawl
        #[arg(long, default_value_t = DEFAULT_FETCH_COUNT,
              value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Crawl the new sources right away without asking
        #[arg(long)]
        crawl: bool,
    },

    /// Crawl one source id, or `all`
    Crawl {
        #[arg(value_name = "ID")]
        source: String,
    },

    /// List registered sources
    List,

    /// Crawl every source on the configured interval until Ctrl-C
    Schedule,

    /// Fetch a single article page
    Article {
        #[arg(value_name = "URL")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let settings = load_settings(cli.settings.as_deref()).context("failed to load settings")?;
    tracing::debug!(
        "Registry: {}, credentials: {}, database: {}",
        settings.paths.registry_path.display(),
        settings.paths.credential_path.display(),
        settings.paths.database_path.display()
    );

    match cli.command {
        Command::Add {
            names,
            count,
            crawl,
        } => handle_add(&settings, names, count, crawl).await,
        Command::Crawl { source } => handle_crawl(&settings, &source).await,
        Command::List => handle_list(&settings, cli.settings.as_deref()),
        Command::Schedule => handle_schedule(&settings).await,
        Command::Article { url } => handle_article(&settings, &url).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wechat_sources=info,warn"),
            1 => EnvFilter::new("wechat_sources=debug,info"),
            2 => EnvFilter::new("wechat_sources=trace,debug"),
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

fn load_registry(settings: &Settings) -> (ConfigStore, SourceRegistry) {
    let store = ConfigStore::new(&settings.paths.registry_path);
    let registry =
        SourceRegistry::from_document(store.load(), RegistryPolicy::from(&settings.registry));
    (store, registry)
}

fn build_client(settings: &Settings) -> anyhow::Result<MpClient> {
    Ok(MpClient::new(
        &settings.platform.base_url,
        settings.crawl.request_timeout(),
    )?)
}

/// Orchestrator fetching through the admin console and storing into SQLite
fn build_orchestrator(
    settings: &Settings,
    registry: &SourceRegistry,
) -> anyhow::Result<CrawlOrchestrator> {
    let client = build_client(settings)?.with_session(registry.session().clone());
    let store: Arc<SqliteStore> = Arc::new(
        open_store(&settings.paths.database_path).context("failed to open article database")?,
    );

    if settings.crawl.vector_sync_enabled {
        tracing::debug!("Vector sync is enabled; articles are stored for downstream indexing");
    }

    Ok(CrawlOrchestrator::from_settings(Arc::new(client), &settings.crawl).with_sink(store))
}

/// Handles `add`: resolves names to sources, persists them, optionally crawls
async fn handle_add(
    settings: &Settings,
    names: Option<String>,
    count: u32,
    crawl: bool,
) -> anyhow::Result<()> {
    let input = match names {
        Some(names) => names,
        None => Input::<String>::new()
            .with_prompt("Account names (comma-separated)")
            .allow_empty(true)
            .interact_text()?,
    };
    let names = parse_names(&input);
    if names.is_empty() {
        println!("No account names given, nothing to do");
        return Ok(());
    }

    let (store, mut registry) = load_registry(settings);
    let provider = SessionProvider::new(
        Some(registry.session().clone()),
        &settings.paths.credential_path,
    )
    .with_login(Arc::new(PromptLogin::new()));
    let client = build_client(settings)?;

    let report = register_sources(&names, count, &provider, &client, &mut registry, &store).await?;

    for (name, reason) in &report.skipped {
        println!("  skipped {}: {}", name, reason);
    }
    if report.is_empty() {
        println!("No new sources registered");
        return Ok(());
    }
    for id in &report.added_ids {
        println!("  added {}", id);
    }
    println!(
        "✓ {} now holds {} sources",
        store.path().display(),
        registry.len()
    );

    let crawl_now = crawl
        || Confirm::new()
            .with_prompt("Crawl the new sources now?")
            .default(false)
            .interact()?;

    if crawl_now {
        let orchestrator = build_orchestrator(settings, &registry)?;
        let report = orchestrator.run(&registry, &report.added_ids).await;
        print_report(&report);
    }

    Ok(())
}

/// Handles `crawl`: one manual pass over an id or every source
async fn handle_crawl(settings: &Settings, source: &str) -> anyhow::Result<()> {
    let (_, registry) = load_registry(settings);

    let ids = if source == ALL_SOURCES {
        registry.ids()
    } else {
        vec![source.to_string()]
    };
    if ids.is_empty() {
        println!("No sources registered");
        return Ok(());
    }

    let orchestrator = build_orchestrator(settings, &registry)?;
    let report = orchestrator.run(&registry, &ids).await;
    print_report(&report);

    if report.failed() > 0 && report.succeeded() == 0 {
        bail!("every requested source failed");
    }
    Ok(())
}

/// Handles `list`: prints the registered sources and their latest stored article
fn handle_list(settings: &Settings, settings_path: Option<&Path>) -> anyhow::Result<()> {
    let (store, registry) = load_registry(settings);

    if let Some(path) = settings_path {
        println!(
            "Settings: {} (hash: {})",
            path.display(),
            compute_settings_hash(path)?
        );
    }
    println!("Registry: {}\n", store.path().display());
    println!(
        "Session: {}",
        if registry.session().is_usable() {
            "present"
        } else {
            "missing"
        }
    );

    let articles = if settings.paths.database_path.exists() {
        Some(open_store(&settings.paths.database_path).context("failed to open article database")?)
    } else {
        None
    };

    println!("Sources ({}):", registry.len());
    for record in registry.records() {
        println!(
            "  - {} {} (count {}, created {})",
            record.id,
            record.name,
            record.fetch_count,
            chrono::DateTime::<chrono::Utc>::from_timestamp(record.created_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| record.created_at.to_string())
        );

        if let Some(db) = &articles {
            let stored = db.count_articles(Some(&record.id))?;
            if let Some(latest) = db.recent_articles(&record.id, 1)?.into_iter().next() {
                println!("      {} stored, latest: {}", stored, latest.title);
            }
        }
    }

    Ok(())
}

/// Handles `schedule`: crawls on the configured interval until Ctrl-C
async fn handle_schedule(settings: &Settings) -> anyhow::Result<()> {
    let (_, registry) = load_registry(settings);
    let orchestrator = Arc::new(build_orchestrator(settings, &registry)?);
    let registry = Arc::new(RwLock::new(registry));

    let scheduler = Arc::new(CrawlScheduler::from_settings(
        orchestrator,
        registry,
        &settings.crawl,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let Some(handle) = scheduler.spawn(shutdown_rx) else {
        println!("Auto crawl is disabled (AUTO_CRAWL_ENABLED)");
        return Ok(());
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Received Ctrl-C, shutting down");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}

/// Handles `article`: fetches and prints one article page
async fn handle_article(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let (_, registry) = load_registry(settings);
    let mut client = build_client(settings)?;
    if registry.session().is_usable() {
        client = client.with_session(registry.session().clone());
    }

    let detail = client.fetch_article(url).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

fn print_report(report: &CrawlReport) {
    println!("\n=== Crawl Results ===\n");
    for (id, outcome) in &report.outcomes {
        match outcome {
            SourceOutcome::Fetched { articles } => {
                println!("  ✓ {}: {} articles", id, articles.len())
            }
            SourceOutcome::Failed { error } => println!("  ✗ {}: {}", id, error),
        }
    }
    println!(
        "\n{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
}
