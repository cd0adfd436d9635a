//! Profile-Sieve main entry point
//!
//! This is the command-line interface for the Profile-Sieve directory crawler.

use anyhow::Context;
use clap::Parser;
use profile_sieve::api::DirectoryClient;
use profile_sieve::config::{load_config_with_hash, Config, SearchSettings, SettingsProvider};
use profile_sieve::crawler::{CrawlSettings, Crawler};
use profile_sieve::pool::CredentialPool;
use profile_sieve::state::SearchRequest;
use profile_sieve::storage::{open_storage, ProgressStore, SearchControl};
use profile_sieve::{RunOutcome, SieveError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Profile-Sieve: a resumable, credential-rotating directory crawler
///
/// Profile-Sieve walks a rate-limited profile directory city by city,
/// strategy by strategy and age by age, records profiles whose text matches
/// the configured keywords, and can be stopped and resumed at any page.
#[derive(Parser, Debug)]
#[command(name = "profile-sieve")]
#[command(version)]
#[command(about = "A resumable, credential-rotating directory crawler", long_about = None)]
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

    /// Only act on these users (repeatable); defaults to every configured user
    #[arg(long = "user", value_name = "NAME")]
    users: Vec<String>,

    /// Start fresh crawls, discarding stored progress
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "stop"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "stop"])]
    stats: bool,

    /// Write the markdown export of found profiles and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "stop"])]
    export_summary: bool,

    /// Ask running crawls of the selected users to stop
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    stop: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let selected = select_searches(&config, &cli.users)?;

    if cli.dry_run {
        handle_dry_run(&config, &selected);
    } else if cli.stats {
        handle_stats(&config, &selected)?;
    } else if cli.export_summary {
        handle_export_summary(&config, &selected)?;
    } else if cli.stop {
        handle_stop(&config, &selected)?;
    } else {
        handle_crawl(config, selected, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("profile_sieve=info,warn"),
            1 => EnvFilter::new("profile_sieve=debug,info"),
            2 => EnvFilter::new("profile_sieve=trace,debug"),
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

/// Resolves `--user` names to their search settings
fn select_searches(config: &Config, users: &[String]) -> Result<Vec<SearchSettings>, SieveError> {
    if users.is_empty() {
        return Ok(config.searches.clone());
    }

    users
        .iter()
        .map(|user| {
            config
                .get_settings(user)
                .ok_or_else(|| SieveError::UnknownUser(user.clone()))
        })
        .collect()
}

fn user_names(searches: &[SearchSettings]) -> Vec<String> {
    searches.iter().map(|s| s.user.clone()).collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, searches: &[SearchSettings]) {
    println!("=== Profile-Sieve Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Version: {}", config.api.version);
    println!("  Page size: {}", config.api.page_size);
    println!("  Max offset per cell: {}", config.api.max_offset);
    println!("  Minimum population: {}", config.api.min_population);
    println!(
        "  Credentials: {}",
        config.credentials.usable_tokens().len()
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSearches ({}):", searches.len());
    for settings in searches {
        // Already validated while loading the config
        let Ok(request) = SearchRequest::from_settings(settings) else {
            continue;
        };
        let ages = request.ages().count();
        println!(
            "  - {}: {} cities, ages {}-{}, {} keywords{}",
            settings.user,
            request.cities().len(),
            request.age_from(),
            request.age_to(),
            request.keywords().len(),
            if request.check_recent_activity() {
                ", recent activity checked"
            } else {
                ""
            }
        );
        for city in request.cities() {
            println!("    * {}", city);
        }
        println!(
            "    {} cells to walk",
            request.cities().len() * 2 * ages
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, searches: &[SearchSettings]) -> anyhow::Result<()> {
    use profile_sieve::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, &user_names(searches))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: writes the markdown export
fn handle_export_summary(config: &Config, searches: &[SearchSettings]) -> anyhow::Result<()> {
    use profile_sieve::output::generate_markdown_summary;

    println!("=== Exporting Found Profiles ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let written = generate_markdown_summary(
        &storage,
        &user_names(searches),
        Path::new(&config.output.summary_path),
    )?;

    println!(
        "✓ {} profiles exported to: {}",
        written, config.output.summary_path
    );

    Ok(())
}

/// Handles the --stop mode: clears the searching flag of every selected user
fn handle_stop(config: &Config, searches: &[SearchSettings]) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;

    for settings in searches {
        storage.set_searching(&settings.user, false)?;
        println!("✓ Stop requested for {}", settings.user);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    searches: Vec<SearchSettings>,
    fresh: bool,
) -> anyhow::Result<()> {
    let tokens = config.credentials.usable_tokens();
    if tokens.is_empty() {
        return Err(SieveError::NoCredentials.into());
    }
    if searches.is_empty() {
        tracing::warn!("No [[search]] blocks configured, nothing to crawl");
        return Ok(());
    }

    let pool = Arc::new(CredentialPool::new(tokens, config.pool.clone()));
    let client = DirectoryClient::new(&config.api, &config.delays, pool)?;
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);

    let crawler = Arc::new(Crawler::new(
        Arc::new(client),
        storage.clone(),
        storage.clone(),
        storage.clone(),
        CrawlSettings::from_config(&config),
    ));

    let users = user_names(&searches);
    for user in &users {
        if fresh {
            tracing::info!(user = %user, "Discarding stored progress");
            storage.clear_progress(user)?;
        }
        storage.set_searching(user, true)?;
    }

    let interrupt_storage = storage.clone();
    let interrupt_users = users.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping all crawls after the current page");
            for user in &interrupt_users {
                if let Err(e) = interrupt_storage.set_searching(user, false) {
                    tracing::error!(user = %user, "Failed to clear searching flag: {}", e);
                }
            }
        }
    });

    let mut handles = Vec::with_capacity(searches.len());
    for settings in searches {
        let crawler = crawler.clone();
        handles.push(tokio::spawn(async move {
            let result = crawler.run_crawl(&settings.user, &settings).await;
            (settings.user, result)
        }));
    }

    let mut failures = 0usize;
    for handle in handles {
        let (user, result) = handle.await.context("Crawl task panicked")?;
        match result {
            Ok(summary) => {
                let outcome = match summary.outcome {
                    RunOutcome::Completed => "completed",
                    RunOutcome::Cancelled => "stopped",
                };
                tracing::info!(
                    user = %user,
                    resumed = summary.resumed,
                    pages = summary.pages_fetched,
                    checked = summary.profiles_checked,
                    found = summary.profiles_found,
                    "Crawl {}",
                    outcome
                );
            }
            Err(e) => {
                failures += 1;
                tracing::error!(user = %user, "Crawl failed: {}", e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} crawls failed", failures, users.len());
    }

    Ok(())
}
