//! Roster CLI
//!
//! Local execution entry point. For AWS Lambda, use `roster-lambda`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use roster::{
    error::Result,
    models::{Backend, Config},
    pipeline::{self, PaginationCrawler, RosterPipeline},
    services::{HtmlPageFetcher, LikeCounter},
    storage::{self, codec},
};

/// Roster - Organization Member Crawler
#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Daily organization member roster with day-over-day deltas"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "roster.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl, diff against yesterday, and persist today's snapshot
    Run {
        /// Day to record (default: today, local time)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Override the configured storage backend
        #[arg(long)]
        backend: Option<Backend>,
    },

    /// Crawl the listing and print the members as CSV
    Crawl,

    /// Diff two snapshot files without crawling
    Diff {
        prior: PathBuf,
        current: PathBuf,

        /// Print JSON instead of CSV
        #[arg(long)]
        json: bool,
    },

    /// Sum the likes over every item of one user
    Likes {
        user: String,

        /// Print per-item JSON instead of the total
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = if cli.config.exists() {
        Config::load(&cli.config).map(Some)
    } else {
        Ok(None)
    };
    let level = match &loaded {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => "info".to_string(),
    };
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(Some(config)) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Ok(None) => {
            log::warn!(
                "Config file {} not found. Using defaults.",
                cli.config.display()
            );
            Config::default()
        }
        Err(e) => {
            log::error!("Config load failed from {}: {}", cli.config.display(), e);
            return ExitCode::from(e.exit_code());
        }
    };

    match execute(cli.command, config, &cli.config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(command: Command, mut config: Config, config_path: &Path) -> Result<u8> {
    config.apply_env_overrides()?;

    match command {
        Command::Run { date, backend } => {
            if let Some(backend) = backend {
                config.storage.backend = backend;
            }
            let today = date.unwrap_or_else(|| Local::now().date_naive());

            let store = storage::open(&config.storage).await?;
            let fetcher = HtmlPageFetcher::new(&config)?;
            let pipeline = RosterPipeline::new(&config, &fetcher, store.as_ref())?;

            let report = pipeline.run(today, &mut std::io::stdout()).await?;
            for failed in &report.step_errors {
                log::error!("Step {} failed: {}", failed.step, failed.error);
            }
            if report.is_degraded() {
                log::warn!("Run for {} finished with failed steps", report.date);
            } else {
                log::info!("Run for {} complete!", report.date);
            }
            Ok(report.exit_code())
        }

        Command::Crawl => {
            config.validate()?;
            let fetcher = HtmlPageFetcher::new(&config)?;
            let mut snapshot = PaginationCrawler::new(&fetcher, config.crawler.max_pages)
                .crawl()
                .await?;
            let dropped = snapshot.dedup_by_name();
            if dropped > 0 {
                log::warn!("Dropped {} repeated member names", dropped);
            }

            let bytes = codec::encode_members(snapshot.members())?;
            let mut stdout = std::io::stdout();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            log::info!("Crawled {} members", snapshot.len());
            Ok(0)
        }

        Command::Diff {
            prior,
            current,
            json,
        } => {
            let prior = codec::decode_members(&std::fs::read(&prior)?)?;
            let current = codec::decode_members(&std::fs::read(&current)?)?;

            let diffs = pipeline::calculate_diff(&prior, &current);
            let summary = pipeline::summarize(&prior, &current, &diffs);

            let mut stdout = std::io::stdout();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &diffs)?;
                writeln!(stdout)?;
            } else {
                stdout.write_all(&codec::encode_diff(&diffs)?)?;
            }
            stdout.flush()?;
            pipeline::report::log_summary(&summary);
            Ok(0)
        }

        Command::Likes { user, json } => {
            config.validate()?;
            let counter = LikeCounter::new(&config)?;
            let total = counter.total_likes(&user).await?;

            let mut stdout = std::io::stdout();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &total)?;
                writeln!(stdout)?;
            } else {
                writeln!(stdout, "{}", total.total)?;
            }
            stdout.flush()?;
            log::info!(
                "{} has {} likes over {} items",
                total.user,
                total.total,
                total.items.len()
            );
            Ok(0)
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({})", config_path.display());
            log::info!(
                "Organization '{}', storage {} at {}",
                config.crawler.organization,
                config.storage.backend,
                match config.storage.backend {
                    Backend::Local => config.storage.local_dir.display().to_string(),
                    Backend::S3 => format!("s3://{}", config.storage.bucket),
                }
            );
            Ok(0)
        }
    }
}
