//! Vernala main entry point
//!
//! This is the command-line interface for the Vernala dictionary scraper.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vernala_scraper::config::{load_config_with_hash, Config};
use vernala_scraper::crawler::{resolve_scope, run_scrape, ScrapeScope};
use vernala_scraper::output::{load_statistics, print_report, print_statistics};
use vernala_scraper::storage::{open_storage, MatchMode, Storage};
use vernala_scraper::{DictionaryEntry, LanguageRegistry, SourceLanguage};

/// Vernala: a polite dictionary scraper
///
/// Vernala walks the browse pages of webonary dictionaries letter by letter,
/// one request at a time at a fixed pace, and stores normalized entries in
/// SQLite (and optionally JSON) for offline lookup.
#[derive(Parser, Debug)]
#[command(name = "vernala-scraper")]
#[command(version)]
#[command(about = "A polite webonary dictionary scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Language to scrape or look up (repeatable; default: all)
    #[arg(short = 'l', long = "language", value_name = "LANG")]
    languages: Vec<String>,

    /// Browse letter (repeatable; default: all letters of each language)
    #[arg(short = 't', long = "letter", value_name = "LETTER")]
    letters: Vec<String>,

    /// Source language, en or fr (repeatable; default: both)
    #[arg(short = 's', long = "source", value_name = "SOURCE")]
    sources: Vec<SourceLanguage>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "lookup"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "lookup"])]
    stats: bool,

    /// Look a word up in the database and exit
    #[arg(long, value_name = "WORD", conflicts_with_all = ["dry_run", "stats"])]
    lookup: Option<String>,

    /// How --lookup matches: exact, prefix or contains
    #[arg(long = "match", value_name = "MODE", default_value = "exact", requires = "lookup")]
    match_mode: MatchMode,

    /// Maximum number of entries shown per language by --lookup
    #[arg(long, default_value_t = 20, requires = "lookup")]
    limit: usize,

    /// Look WORD up among vernacular translations instead of headwords
    #[arg(long, requires = "lookup")]
    reverse: bool,
}

impl Cli {
    fn scope(&self) -> ScrapeScope {
        ScrapeScope {
            languages: self.languages.clone(),
            letters: self.letters.clone(),
            sources: self.sources.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &cli.scope())?;
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if let Some(word) = &cli.lookup {
        handle_lookup(&config, &cli, word)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_scrape(&config, &config_hash, &cli.scope()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vernala_scraper=info,warn"),
            1 => EnvFilter::new("vernala_scraper=debug,info"),
            2 => EnvFilter::new("vernala_scraper=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, scope: &ScrapeScope) -> anyhow::Result<()> {
    println!("=== Vernala Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Minimum request interval: {}ms",
        config.crawler.min_request_interval_ms
    );
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!(
        "  Max concurrent combinations: {}",
        config.crawler.max_concurrent_combinations
    );
    println!(
        "  Retries: {} (backoff {}ms..{}ms)",
        config.crawler.max_retries, config.crawler.retry_base_delay_ms, config.crawler.retry_max_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Page size: {}, max pages per letter: {}",
        config.crawler.page_size, config.crawler.max_pages_per_letter
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(dir) = &config.output.json_dir {
        println!("  JSON: {}", dir);
    }
    println!("  Summary: {}", config.output.summary_path);

    let registry = LanguageRegistry::with_entries(&config.languages)?;
    println!("\nLanguages ({}):", registry.len());
    for lang in registry.languages() {
        println!(
            "  - {} ({}, {}): {} letters, sources {}",
            lang.id,
            lang.name,
            lang.code,
            lang.letters.len(),
            lang.sources
                .iter()
                .map(|s| s.code())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("    {}", lang.url_template);
    }

    let combinations = resolve_scope(&registry, scope)?;
    println!("\n✓ Configuration is valid");
    println!("✓ Would scrape {} combination(s)", combinations.len());
    if let Some(first) = combinations.first() {
        let url = first
            .language
            .page_url(first.combination.source, &first.combination.letter, 1)?;
        println!("  First request: {}", url);
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --lookup mode: queries the database and prints matching entries
fn handle_lookup(config: &Config, cli: &Cli, word: &str) -> anyhow::Result<()> {
    let registry = LanguageRegistry::with_entries(&config.languages)?;
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let languages: Vec<String> = if cli.languages.is_empty() {
        registry.ids().map(str::to_string).collect()
    } else {
        cli.languages.clone()
    };
    let sources: Vec<SourceLanguage> = if cli.sources.is_empty() {
        SourceLanguage::all().to_vec()
    } else {
        cli.sources.clone()
    };

    let mut found = 0;
    for id in &languages {
        let lang = registry.config_for(id)?;

        if cli.reverse {
            let entries = storage.query_reverse(&lang.code, word, cli.match_mode, cli.limit)?;
            found += entries.len();
            print_entries(&lang.name, None, &entries);
            continue;
        }

        for source in &sources {
            let entries = storage.query(*source, &lang.code, word, cli.match_mode, cli.limit)?;
            found += entries.len();
            print_entries(&lang.name, Some(*source), &entries);
        }
    }

    if found == 0 {
        println!("No {} match for '{}'", cli.match_mode, word);
    }

    Ok(())
}

fn print_entries(language: &str, source: Option<SourceLanguage>, entries: &[DictionaryEntry]) {
    if entries.is_empty() {
        return;
    }

    match source {
        Some(source) => println!("{} ({}):", language, source.display_name()),
        None => println!("{}:", language),
    }
    for entry in entries {
        let mut line = format!("  {}", entry.headword);
        if let Some(sense) = entry.sense_index {
            line.push_str(&format!(" {}", sense));
        }
        if let Some(pos) = &entry.part_of_speech {
            line.push_str(&format!(" ({})", pos));
        }
        if entry.incomplete {
            line.push_str(" - no translation recorded");
        } else {
            line.push_str(&format!(" - {}", entry.words().join(", ")));
        }
        if !entry.variants.is_empty() {
            line.push_str(&format!(" [also: {}]", entry.variants.join(", ")));
        }
        println!("{}", line);
    }
    println!();
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config, config_hash: &str, scope: &ScrapeScope) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests and writing partial results");
            ctrl_c.cancel();
        }
    });

    let report = run_scrape(config, config_hash, scope, cancel).await?;
    print_report(&report);

    if report.all_failed() {
        tracing::error!("Every combination failed");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
