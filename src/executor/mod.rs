//! The boundary to whatever actually fetches and transcodes media.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::request::{MediaKind, Request};

mod ytdlp;

pub use ytdlp::YtDlpExecutor;

/// Container every video download is merged into
pub const VIDEO_CONTAINER: &str = "mp4";

/// Codec audio-only downloads are transcoded to
pub const AUDIO_CODEC: &str = "mp3";

/// Post-download processing step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "key")]
pub enum PostProcessor {
    /// Extract the audio track and transcode it
    ExtractAudio {
        codec: String,
        /// Bitrate in kbps
        quality: String,
    },
}

/// Declarative description of a single download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Format selector understood by the executor
    pub format: String,
    /// Where to write the file; `%(title)s` and `%(ext)s` are filled in by
    /// the executor
    pub output_template: String,
    /// Container the streams are merged into, if any
    pub merge_output_format: Option<String>,
    pub post_processors: Vec<PostProcessor>,
}

impl DownloadOptions {
    /// Build the options for `request`, writing into `output_dir`
    pub fn for_request(request: &Request, output_dir: &Path) -> Self {
        let output_template = output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();
        let quality = request.quality();

        match request.media_kind() {
            MediaKind::AudioOnly => Self {
                format: "bestaudio/best".to_string(),
                output_template,
                merge_output_format: None,
                post_processors: vec![PostProcessor::ExtractAudio {
                    codec: AUDIO_CODEC.to_string(),
                    quality: quality.audio_bitrate().to_string(),
                }],
            },
            MediaKind::Video => Self {
                format: match quality.max_height() {
                    Some(height) => format!("bestvideo[height<={height}]+bestaudio/best"),
                    None => "best".to_string(),
                },
                output_template,
                merge_output_format: Some(VIDEO_CONTAINER.to_string()),
                post_processors: Vec::new(),
            },
        }
    }
}

/// Progress payload as reported by the executor.
///
/// Mirrors the executor's own progress dictionary; any field may be missing
/// or garbage, so nothing here is trusted until [`ProgressReport::percent`]
/// has made sense of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
    pub status: String,
    #[serde(rename = "_percent_str", default)]
    pub percent_str: Option<String>,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
}

impl ProgressReport {
    pub fn downloading(percent_str: &str) -> Self {
        Self {
            status: "downloading".to_string(),
            percent_str: Some(percent_str.to_string()),
            ..Default::default()
        }
    }

    pub fn finished() -> Self {
        Self {
            status: "finished".to_string(),
            ..Default::default()
        }
    }

    /// Percent complete, truncated and clamped to 0..=100. `None` when the
    /// report carries nothing usable.
    pub fn percent(&self) -> Option<u8> {
        let raw = match self.status.as_str() {
            "finished" => return Some(100),
            "downloading" => self
                .percent_str
                .as_deref()
                .and_then(parse_percent)
                .or_else(|| self.byte_ratio())?,
            _ => return None,
        };

        if !raw.is_finite() {
            return None;
        }
        Some(raw.clamp(0.0, 100.0) as u8)
    }

    fn byte_ratio(&self) -> Option<f64> {
        let downloaded = self.downloaded_bytes?;
        let total = self.total_bytes.or(self.total_bytes_estimate)?;
        if total <= 0.0 {
            return None;
        }
        Some(downloaded / total * 100.0)
    }
}

/// Parse strings like `" 42.5%"`
fn parse_percent(text: &str) -> Option<f64> {
    text.trim().trim_end_matches('%').trim().parse::<f64>().ok()
}

/// Something that can download one source URL.
///
/// Implementations call `on_progress` zero or more times while running and
/// must return only once the download has finished or failed.
#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    async fn download(
        &self,
        source: &str,
        options: &DownloadOptions,
        on_progress: &(dyn Fn(ProgressReport) + Send + Sync),
    ) -> Result<()>;
}
