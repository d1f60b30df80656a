use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::request::RequestPreset;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub download_dir: PathBuf,
    pub poll_interval: Duration,
    pub ytdlp_binary: PathBuf,
    /// `None` for an unbounded queue
    pub queue_capacity: Option<usize>,
    pub preset: RequestPreset,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            download_dir: env::var("PLAYGET_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            poll_interval: env::var("PLAYGET_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            ytdlp_binary: env::var("PLAYGET_YTDLP")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_binary),
            queue_capacity: env::var("PLAYGET_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0),
            preset: defaults.preset,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("Downloads"),
            poll_interval: Duration::from_millis(500),
            ytdlp_binary: PathBuf::from("yt-dlp"),
            queue_capacity: None,
            preset: RequestPreset::default(),
        }
    }
}
