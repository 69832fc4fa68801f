//! driveup CLI - back up JSON data into a Google Drive folder.
//!
//! Each command prints a JSON report on stdout. Failures print a report with
//! the error kind, provider status and remediation hints, and exit non-zero.

mod commands;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use driveup_storage::DriveConfig;

#[derive(Parser)]
#[command(name = "driveup")]
#[command(about = "driveup - Upsert JSON files into Google Drive")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one local JSON file.
    Backup {
        /// File to upload; its base name is the remote file name.
        #[arg(short, long, env = "DATA_PATH", default_value = "./data.json")]
        file: PathBuf,
    },

    /// Upload every JSON file in a directory.
    Bulk {
        /// Directory to scan (not recursive).
        #[arg(short, long, env = "DATA_DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Fetch JSON from an upstream API and upload it.
    Fetch {
        /// Upstream URL.
        #[arg(short, long, env = "SOURCE_URL")]
        url: Option<String>,

        /// Remote file name.
        #[arg(short, long, default_value = commands::DEFAULT_FILE_NAME)]
        name: String,

        /// Follow HTTP redirects from the upstream API.
        #[arg(long)]
        follow_redirects: bool,

        /// Upstream request timeout in seconds.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Upload on a schedule until interrupted.
    Watch {
        /// Upstream URL; takes precedence over --file.
        #[arg(short, long, env = "SOURCE_URL")]
        url: Option<String>,

        /// Local file used when no URL is set.
        #[arg(short, long, env = "DATA_PATH", default_value = "./data.json")]
        file: PathBuf,

        /// Seconds between runs.
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Follow HTTP redirects from the upstream API.
        #[arg(long)]
        follow_redirects: bool,

        /// Upstream request timeout in seconds.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Check credentials and folder access without uploading.
    TestConnection,

    /// Show folder metadata and whether it is in a Shared Drive.
    Folder {
        /// Folder ID (default: GOOGLE_DRIVE_FOLDER_ID).
        #[arg(short, long)]
        id: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Backup { .. } => "backup",
            Commands::Bulk { .. } => "bulk",
            Commands::Fetch { .. } => "fetch",
            Commands::Watch { .. } => "watch",
            Commands::TestConnection => "test-connection",
            Commands::Folder { .. } => "folder",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed arguments see it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;

    let name = cli.command.name();
    let outcome = match DriveConfig::from_env() {
        Ok(config) => run(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(body) => {
            let report = serde_json::to_string_pretty(&report::success(name, body))
                .context("Failed to serialize report")?;
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            let report = serde_json::to_string_pretty(&report::failure(name, &e))
                .context("Failed to serialize report")?;
            println!("{}", report);
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands, config: &DriveConfig) -> driveup_common::Result<serde_json::Value> {
    match command {
        Commands::Backup { file } => commands::backup(config, &file).await,

        Commands::Bulk { dir } => commands::bulk(config, &dir).await,

        Commands::Fetch {
            url,
            name,
            follow_redirects,
            timeout,
        } => {
            let upstream = commands::Upstream::new(follow_redirects, timeout);
            commands::fetch(config, url.as_deref(), &name, upstream).await
        }

        Commands::Watch {
            url,
            file,
            interval,
            follow_redirects,
            timeout,
        } => {
            let upstream = commands::Upstream::new(follow_redirects, timeout);
            let source = commands::watch_source(url.as_deref(), file, upstream)?;
            commands::watch(config, source, Duration::from_secs(interval.max(1))).await
        }

        Commands::TestConnection => commands::test_connection(config).await,

        Commands::Folder { id } => commands::folder(config, id.as_deref()).await,
    }
}
