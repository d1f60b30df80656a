use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{DownloadExecutor, DownloadOptions, PostProcessor, ProgressReport};

/// Marker prefixed to every progress line so it can be told apart from the
/// rest of yt-dlp's output
const PROGRESS_MARKER: &str = "playget-progress:";

/// How many trailing stderr lines end up in a failure message
const STDERR_TAIL_LINES: usize = 5;

/// Runs downloads through the `yt-dlp` command line program
#[derive(Debug, Clone)]
pub struct YtDlpExecutor {
    binary: PathBuf,
}

impl YtDlpExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// Build the full yt-dlp command for one source
    pub fn build_command(&self, source: &str, options: &DownloadOptions) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(source, options));
        cmd
    }

    /// Arguments passed to yt-dlp, in order
    pub fn build_args(&self, source: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-colors".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--progress-template".into(),
            format!("download:{PROGRESS_MARKER}%(progress)j"),
            "-f".into(),
            options.format.clone(),
            "-o".into(),
            options.output_template.clone(),
        ];

        if let Some(container) = &options.merge_output_format {
            args.push("--merge-output-format".into());
            args.push(container.clone());
        }

        for post in &options.post_processors {
            match post {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("-x".into());
                    args.push("--audio-format".into());
                    args.push(codec.clone());
                    args.push("--audio-quality".into());
                    args.push(format!("{quality}K"));
                }
            }
        }

        // Keep the source from being read as an option
        args.push("--".into());
        args.push(source.to_string());
        args
    }
}

impl Default for YtDlpExecutor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Decode a progress line printed through our progress template.
///
/// Returns `None` for ordinary output and for lines whose payload does not
/// parse.
pub fn parse_progress_line(line: &str) -> Option<ProgressReport> {
    let payload = line.trim().strip_prefix(PROGRESS_MARKER)?;
    match serde_json::from_str(payload) {
        Ok(report) => Some(report),
        Err(e) => {
            debug!("Ignoring unparseable progress payload: {}", e);
            None
        }
    }
}

/// Decode one raw output line. yt-dlp prints titles in the console
/// encoding, which is not always UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Collect the last few lines of a stream
async fn tail_lines<R: AsyncRead + Unpin>(reader: R, keep: usize) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(keep);
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Ok(Some(raw)) = segments.next_segment().await {
        let line = decode_line(&raw);
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

#[async_trait]
impl DownloadExecutor for YtDlpExecutor {
    async fn download(
        &self,
        source: &str,
        options: &DownloadOptions,
        on_progress: &(dyn Fn(ProgressReport) + Send + Sync),
    ) -> Result<()> {
        let mut cmd = self.build_command(source, options);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!("Executing yt-dlp command: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {:?}", self.binary))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("yt-dlp stderr was not captured"))?;

        // Drain stderr alongside stdout so a chatty child never blocks on a
        // full pipe
        let stderr_tail = tokio::spawn(tail_lines(stderr, STDERR_TAIL_LINES));

        // Stop reading on a pipe error but still wait for the child, so the
        // exit status decides the outcome
        let mut segments = BufReader::new(stdout).split(b'\n');
        loop {
            let raw = match segments.next_segment().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read yt-dlp output: {}", e);
                    break;
                }
            };
            let line = decode_line(&raw);
            match parse_progress_line(&line) {
                Some(report) => on_progress(report),
                None => debug!("yt-dlp> {}", line),
            }
        }

        let status = child.wait().await.context("Failed to wait for yt-dlp")?;
        let tail = stderr_tail.await.unwrap_or_default();

        if !status.success() {
            let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
            error!("yt-dlp failed for {}: {}", source, stderr);
            if stderr.is_empty() {
                return Err(anyhow!("yt-dlp exited with {status}"));
            }
            return Err(anyhow!("yt-dlp exited with {status}: {stderr}"));
        }

        info!("✅ Download finished: {}", source);
        Ok(())
    }
}
