pub mod check;
pub mod get;
pub mod observer;
pub mod watch;

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::Config;
use crate::request::{MediaKind, Quality, RequestPreset};

/// Download options shared by the commands that run the worker
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Folder downloads are written to [env: PLAYGET_DOWNLOAD_DIR, default: Downloads]
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    /// Download audio only (mp3) instead of video
    #[arg(long, short = 'a')]
    pub audio: bool,
    /// Quality: best, a video height (1080, 720, 480, 360) or an audio bitrate (320, 256, 192, 128)
    #[arg(long, short = 'q', default_value = "best")]
    pub quality: String,
    /// Print status events as JSON lines instead of a progress bar
    #[arg(long)]
    pub json: bool,
}

impl DownloadArgs {
    /// Environment configuration with these arguments applied on top
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::from_env();
        if let Some(output) = &self.output {
            config.download_dir = output.clone();
        }

        let media_kind = if self.audio {
            MediaKind::AudioOnly
        } else {
            MediaKind::Video
        };
        let quality: Quality = self.quality.parse()?;
        config.preset = RequestPreset::new(media_kind, quality);
        Ok(config)
    }
}
