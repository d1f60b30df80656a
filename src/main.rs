//! # playget - clipboard-driven media downloader
//!
//! Collects media links, either copied to the clipboard or given on the
//! command line, and downloads them one at a time in the background with
//! yt-dlp.
//!
//! ## Features
//!
//! - **Auto Mode**: Every supported link copied to the clipboard is queued
//! - **Serial Downloads**: A single worker processes the queue in order
//! - **Failure Isolation**: A failed download never blocks the rest of the queue
//! - **Audio or Video**: mp3 extraction at a chosen bitrate, or mp4 capped at a chosen height
//! - **Configurable**: Output folder, polling interval and yt-dlp path via environment variables
//!
//! ## Usage
//!
//! ```bash
//! # Watch the clipboard and download every copied link
//! playget watch
//!
//! # Download a couple of links as mp3 and exit
//! playget get --audio -q 192 https://youtu.be/abc123 https://youtu.be/def456
//!
//! # See whether some text contains a supported link
//! playget check "https://youtube.com/watch?v=xyz"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playget::commands::{
    check::CheckCommand, get::GetCommand, watch::WatchCommand, DownloadArgs,
};

/// playget - queue media links and download them one at a time
#[derive(Parser)]
#[command(
    name = "playget",
    about = "Clipboard-driven media downloader",
    long_about = "Queues media links copied to the clipboard or given on the command line and downloads them one at a time with yt-dlp.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Watch the clipboard and download every media link copied
    Watch {
        #[command(flatten)]
        download: DownloadArgs,
        /// Clipboard polling interval in milliseconds [env: PLAYGET_POLL_INTERVAL_MS, default: 500]
        #[arg(long, short = 'i')]
        interval: Option<u64>,
    },
    /// Download the given URLs one by one and exit
    Get {
        /// URLs to download
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        download: DownloadArgs,
    },
    /// Check whether text contains a supported media link
    Check {
        /// Text to check
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playget=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch { download, interval } => match download.config() {
            Ok(config) => {
                info!(
                    "Starting watch command, output: {:?}, preset: {:?}",
                    config.download_dir, config.preset
                );
                WatchCommand::new(config, interval, download.json)
                    .execute()
                    .await
            }
            Err(e) => Err(e),
        },
        Commands::Get { urls, download } => match download.config() {
            Ok(config) => {
                info!(
                    "Starting get command for {} URL(s), output: {:?}",
                    urls.len(),
                    config.download_dir
                );
                GetCommand::new(config, urls, download.json).execute().await
            }
            Err(e) => Err(e),
        },
        Commands::Check { text } => match CheckCommand::new(text).execute() {
            Ok(link) => {
                println!("{link}");
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
