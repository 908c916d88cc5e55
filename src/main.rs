//! Resale-Scout main entry point
//!
//! This is the command-line interface for the Resale-Scout market analyzer.

use clap::Parser;
use resale_scout::analyzer::{progress_channel, share_storage};
use resale_scout::config::{load_config_with_hash, Config};
use resale_scout::output::{
    generate_markdown_report, generate_summary, load_product_stats, print_statistics,
    ProfitCalculator, StatsQuery, StatsSort,
};
use resale_scout::storage::{open_storage, RunStore};
use resale_scout::url::category_id;
use resale_scout::{AnalyzeOptions, Analyzer, RunContext, Scraper};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Resale-Scout: sold-listing market analysis for sealed trading-card products
///
/// Resale-Scout scrapes completed sales from a marketplace, recognizes the
/// product behind each listing title, stores the sales in SQLite and reports
/// resale prices against retail.
#[derive(Parser, Debug)]
#[command(name = "resale-scout")]
#[command(version)]
#[command(about = "Sold-listing market analysis for sealed products", long_about = None)]
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

    /// Search query (overrides analysis.default-query)
    #[arg(long)]
    query: Option<String>,

    /// Category filter token (display, etb, collection, booster, ...)
    #[arg(long)]
    category: Option<String>,

    /// Maximum result pages to scrape
    #[arg(long)]
    max_pages: Option<u32>,

    /// Whole-run deadline in seconds (0 disables it)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["health", "stats", "report"])]
    dry_run: bool,

    /// Probe the marketplace once and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "report"])]
    health: bool,

    /// Show per-product statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "health", "report"])]
    stats: bool,

    /// Generate the markdown report from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "health", "stats"])]
    report: bool,

    /// Sort key for statistics: sales_count, margin_percent or avg_price
    #[arg(long, default_value = "sales_count")]
    sort: String,

    /// Leave out products with fewer sales than this
    #[arg(long, default_value_t = 1)]
    min_sales: usize,

    /// Number of products to show
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli)?;
    } else if cli.health {
        handle_health(&config).await?;
    } else if cli.stats {
        handle_stats(&config, &cli)?;
    } else if cli.report {
        handle_report(&config, &cli)?;
    } else {
        handle_analysis(config, config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return;
    }

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("resale_scout=info,warn"),
            1 => EnvFilter::new("resale_scout=debug,info"),
            2 => EnvFilter::new("resale_scout=trace,debug"),
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

/// Query from the command line, else the configured default
fn resolve_query(config: &Config, cli: &Cli) -> Option<String> {
    cli.query
        .clone()
        .or_else(|| config.analysis.default_query.clone())
        .filter(|q| !q.trim().is_empty())
}

fn stats_query(cli: &Cli) -> Result<StatsQuery, Box<dyn std::error::Error>> {
    let sort = StatsSort::parse(&cli.sort).ok_or_else(|| {
        format!(
            "unknown sort key '{}' (expected sales_count, margin_percent or avg_price)",
            cli.sort
        )
    })?;

    Ok(StatsQuery {
        sort,
        min_sales: cli.min_sales,
        limit: Some(cli.limit),
        ..StatsQuery::default()
    })
}

/// Handles the --dry-run mode: validates config and shows the planned run
fn handle_dry_run(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Resale-Scout Dry Run ===\n");

    let settings = config.scraper_settings()?;

    println!("Scraper Configuration:");
    println!("  Base URL: {}", settings.base_url);
    println!("  Allowed hosts: {}", settings.allowed_hosts.patterns().join(", "));
    println!("  User agents: {}", settings.user_agents.len());
    println!("  Rate limit: {}ms", config.scraper.rate_limit_ms);
    println!(
        "  Retries: {} (initial {}ms, max {}ms, x{})",
        config.retry.max_retries,
        config.retry.initial_delay_ms,
        config.retry.max_delay_ms,
        config.retry.backoff_factor
    );

    println!("\nAnalysis:");
    println!("  Lookback: {} days", config.analysis.lookback_days);
    println!("  Confidence floor: {}", config.analysis.confidence_floor);
    println!(
        "  Patterns: {}",
        config.build_normalizer().pattern_count()
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);

    println!("\n✓ Configuration is valid");
    match resolve_query(config, cli) {
        Some(query) => {
            let category = cli.category.as_deref().unwrap_or("all");
            println!(
                "✓ Would search '{}' in category {} ({}) for up to {} pages",
                query,
                category,
                category_id(cli.category.as_deref()),
                cli.max_pages.unwrap_or(config.analysis.max_pages)
            );
        }
        None => println!("✗ No query given (use --query or analysis.default-query)"),
    }

    Ok(())
}

/// Handles the --health mode: one probe of the base URL
async fn handle_health(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let scraper = Scraper::new(config.scraper_settings()?)?;
    let ctx = RunContext::with_timeout(Duration::from_secs(config.scraper.request_timeout_secs));

    let status = scraper.health_check(&ctx).await;

    println!("=== Health Check ===\n");
    println!("Target: {}", status.target);
    println!("Healthy: {}", if status.healthy { "yes" } else { "no" });
    if let Some(code) = status.status_code {
        println!("Status code: {}", code);
    }
    println!("Response time: {}ms", status.response_time.as_millis());
    if let Some(error) = &status.error {
        println!("Error: {}", error);
    }

    if !status.healthy {
        return Err(format!("{} is not reachable", status.target).into());
    }
    Ok(())
}

/// Handles the --stats mode: prints per-product statistics
fn handle_stats(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_product_stats(&storage, &stats_query(cli)?)?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the --report mode: writes the markdown market report
fn handle_report(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Market Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.report_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;

    tracing::info!("Loading sales from database...");
    let summary = generate_summary(&storage, &stats_query(cli)?)?;

    tracing::info!("Generating markdown report...");
    generate_markdown_report(
        &summary,
        &ProfitCalculator::new(),
        Path::new(&config.output.report_path),
    )?;

    println!("✓ Report exported to: {}", config.output.report_path);

    Ok(())
}

/// Handles the main analysis run
async fn handle_analysis(
    config: Config,
    config_hash: String,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = resolve_query(&config, cli)
        .ok_or("no search query: pass --query or set analysis.default-query")?;

    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    // Runs left behind by a crashed process
    let stale = storage.mark_stale_running(config.analysis.stale_run_minutes)?;
    if stale > 0 {
        tracing::warn!("Marked {} stale running analysis run(s) as failed", stale);
    }

    let scraper = Scraper::new(config.scraper_settings()?)?;
    let analyzer = Analyzer::new(Arc::new(scraper), share_storage(storage))
        .with_normalizer(config.build_normalizer())
        .with_settings(config.analyzer_settings(Some(config_hash)));

    let timeout = match cli.timeout_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.run_timeout(),
    };
    let ctx = match timeout {
        Some(timeout) => RunContext::with_timeout(timeout),
        None => RunContext::new(),
    };

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping analysis");
            interrupt.cancel();
        }
    });

    let (on_progress, mut progress_rx) = progress_channel(32);
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            tracing::info!(
                phase = %progress.phase,
                percent = (progress.percent_complete * 100.0).round() as u32,
                "{}",
                progress.message
            );
        }
    });

    let mut opts = AnalyzeOptions::new(query).on_progress(on_progress);
    if let Some(category) = &cli.category {
        opts = opts.category(category.clone());
    }
    if let Some(max_pages) = cli.max_pages {
        opts = opts.max_pages(max_pages);
    }

    // The options own the only progress sender, so the channel closes here
    let outcome = analyzer.run(opts, &ctx).await;
    let _ = progress_task.await;

    match outcome {
        Ok(result) => {
            println!("\n=== Analysis Complete ===\n");
            println!("Run ID: {}", result.run_id);
            println!("Pages scraped: {}", result.pages_scraped);
            if result.page_errors > 0 {
                println!("Pages failed: {}", result.page_errors);
            }
            println!("Products: {}", result.products_count);
            println!("Sales recorded: {}", result.sales_count);
            println!("Duration: {:.1}s", result.duration.as_secs_f64());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Analysis failed: {}", e);
            Err(e.into())
        }
    }
}
