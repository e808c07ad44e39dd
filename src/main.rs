//! scholarcite - Google Scholar citation counts for a BibTeX file
//!
//! Searches Google Scholar for the title of every entry in a `.bib` file
//! using a real browser window, and writes `Article ID,Title,Citations` to a
//! CSV that is rewritten after each entry.
//!
//! ## Usage
//!
//! ```bash
//! CHROME_PATH=/usr/bin/chromium scholarcite --input refs.bib --output citations.csv
//! ```
//!
//! `CHROME_PATH` may also be set in a `.env` file in the working directory.
//!
//! When Scholar shows a CAPTCHA, solve it in the browser and press Enter in
//! the terminal to continue.

use anyhow::{Context, Result};
use clap::Parser;
use scholarcite::{
    bibliography,
    challenge::ChallengeGate,
    config::{default_profile_dir, PipelineConfig, QueryConfig, ThrottleConfig},
    extract::CitedByExtractor,
    pipeline::{self, Throttle},
    query::QueryEngine,
    session::{close_session, ChromiumSession},
    sink::ResultSink,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar citation counts for every entry of a BibTeX file
#[derive(Parser)]
#[command(name = "scholarcite")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// BibTeX file to read
    #[arg(short, long, default_value = scholarcite::config::DEFAULT_INPUT)]
    input: PathBuf,

    /// CSV file to write (rewritten after every entry)
    #[arg(short, long, default_value = scholarcite::config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Browser executable to drive (Chrome/Chromium)
    #[arg(long, env = "CHROME_PATH")]
    driver_path: PathBuf,

    /// Scholar URL or mirror
    #[arg(long, default_value = scholarcite::config::DEFAULT_SCHOLAR_URL)]
    base_url: String,

    /// Wait after submitting a search before reading results (ms)
    #[arg(long, default_value = "3000")]
    settle_ms: u64,

    /// Pause after every entry (ms)
    #[arg(long, default_value = "5000")]
    delay_ms: u64,

    /// Random extra pause after every entry, up to this many ms
    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    /// Browser profile directory (default: ~/.scholarcite/profile)
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Use a throwaway profile instead of the persistent one
    #[arg(long, conflicts_with = "profile_dir")]
    no_profile: bool,

    /// Run the browser without a window (CAPTCHAs cannot be solved)
    #[arg(long)]
    headless: bool,

    /// DOM id of the CAPTCHA form
    #[arg(long, default_value = scholarcite::config::DEFAULT_CHALLENGE_MARKER)]
    challenge_marker: String,

    /// Skip this many entries from the start of the file
    #[arg(long, default_value = "0")]
    skip: usize,

    /// Query at most this many entries
    #[arg(long)]
    limit: Option<usize>,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::new(self.driver_path);
        config.input = self.input;
        config.output = self.output;

        config.session.headless = self.headless;
        config.session.profile_dir = if self.no_profile {
            None
        } else {
            self.profile_dir.or_else(default_profile_dir)
        };

        config.query = QueryConfig::new(&self.base_url)?;
        config.query.settle = Duration::from_millis(self.settle_ms);

        config.throttle = ThrottleConfig {
            delay: Duration::from_millis(self.delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        };
        config.challenge_marker = self.challenge_marker;
        config.skip = self.skip;
        config.limit = self.limit;

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Load variables from a `.env` file, searching upwards from the working
/// directory when `path` is `None`. Variables already set are kept.
fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => dotenvy::from_path(p).ok().map(|()| p.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before argument parsing so `.env` can supply CHROME_PATH
    let env_file = load_env_file(None);
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Some(path) = &env_file {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = cli.into_config().context("Invalid configuration")?;
    run(config).await
}

async fn run(config: PipelineConfig) -> Result<()> {
    println!("Reading titles from {}...", config.input.display());
    let entries = bibliography::extract_entries(&config.input)?;
    let entries = config.select_entries(entries);

    if entries.is_empty() {
        println!("No titled entries to look up.");
        return Ok(());
    }

    println!(
        "Setting up the browser... {}",
        config.session.driver_path.display()
    );
    let mut session = ChromiumSession::open(&config.session).await?;

    let mut gate = ChallengeGate::stdio(config.challenge_marker.clone());
    let engine = QueryEngine::new(config.query.clone(), Box::new(CitedByExtractor::default()));
    let mut sink = ResultSink::new(&config.output);
    let throttle = Throttle::new(config.throttle);

    println!("Fetching citation counts for {} entries...\n", entries.len());
    let summary = pipeline::run(
        &entries,
        &mut session,
        &mut gate,
        &engine,
        &mut sink,
        &throttle,
    )
    .await;

    close_session(Box::new(session)).await;

    info!(?summary, "Finished");
    println!(
        "\n✓ {} entries processed ({} found, {} not found). Citation counts saved to '{}'.",
        summary.processed,
        summary.resolved,
        summary.unresolved,
        config.output.display()
    );
    if summary.persist_failures > 0 {
        anyhow::bail!(
            "{} of {} saves to {} failed",
            summary.persist_failures,
            summary.processed,
            config.output.display()
        );
    }
    Ok(())
}
