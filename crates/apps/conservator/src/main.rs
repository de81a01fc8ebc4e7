//! Conservator - back up music-service account metadata as raw JSON
//!
//! This is the main entry point for the command-line app.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backup::{ApiCredentials, BackupDriver, BackupOptions, HttpRemoteClient, SyncOptions};

mod console;

use console::ConsoleObserver;

/// Fetch users' favorites and synced track metadata as well as all
/// favorited, owned, collaborated, and subscribed playlists metadata,
/// backing up all raw JSON data as exported by the service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Users (vanity names or user keys) to back up
    #[arg(required = true, value_name = "USER")]
    users: Vec<String>,

    /// Output all JSON data to files in DIR, defaulting to the current directory
    #[arg(short, long, value_name = "DIR", env = "CONSERVATOR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// When fetching data for multiple users, use a single shared object
    /// store and persist all users in the same output file
    #[arg(short, long)]
    single_store: bool,

    /// Also back up the data of all users a specified user is following (non recursive)
    #[arg(short, long)]
    following: bool,

    /// Number of objects fetched per request batch
    #[arg(long, default_value_t = SyncOptions::default().batch_size)]
    batch_size: usize,

    /// Concurrent requests per batch
    #[arg(long, default_value_t = SyncOptions::default().parallel_requests)]
    parallel_requests: usize,

    /// Per-request timeout in seconds; a timed out request cancels that user
    #[arg(long, default_value_t = HttpRemoteClient::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// API credentials file (defaults to ~/.config/conservator/api-credentials.json)
    #[arg(long, value_name = "FILE")]
    credentials: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every user was backed up
fn run(cli: Cli) -> Result<bool> {
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    println!("Conservator v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let output_dir = match cli.output_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Could not determine current directory")?,
    };
    if !output_dir.is_dir() {
        anyhow::bail!("output directory does not exist: {}", output_dir.display());
    }

    let credentials = match &cli.credentials {
        Some(path) => ApiCredentials::from_file(path)?,
        None => ApiCredentials::load().with_context(|| {
            let path = ApiCredentials::default_credentials_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "api-credentials.json".to_string());
            format!(
                "API credentials not found; place them at {} or set \
                 CONSERVATOR_API_URL and CONSERVATOR_ACCESS_TOKEN",
                path
            )
        })?,
    };
    info!("Using API endpoint {}", credentials.base_url);

    let remote = HttpRemoteClient::with_timeout(credentials, Duration::from_secs(cli.timeout));

    let options = BackupOptions {
        output_dir,
        single_store: cli.single_store,
        following: cli.following,
        sync: SyncOptions {
            batch_size: cli.batch_size,
            parallel_requests: cli.parallel_requests,
        },
    };

    let mut driver = BackupDriver::new(Arc::new(remote), options);
    let mut observer = ConsoleObserver::new(cli.single_store);
    let report = driver.run(cli.users, &mut observer)?;

    Ok(report.is_success())
}
