use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::queue::TaskQueue;
use crate::request::RequestPreset;
use crate::status::{StatusBus, StatusEvent};

/// Anything the current clipboard text can be read from
pub trait ClipboardSource: Send + Sync {
    /// Current text. `Ok(None)` when the clipboard is empty or holds
    /// non-text content, `Err` when it could not be read at all.
    ///
    /// May block; the watcher calls it from the blocking thread pool.
    fn read(&self) -> Result<Option<String>>;
}

/// The desktop clipboard, through `arboard`.
///
/// The handle is opened on first use and reopened after a failed read, so a
/// clipboard that is unavailable at startup is picked up later.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&self) -> Result<Option<String>> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| anyhow!("Clipboard unavailable: {e}"))?;
            *handle = Some(clipboard);
        }

        let Some(clipboard) = handle.as_mut() else {
            return Err(anyhow!("Clipboard unavailable"));
        };
        match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => {
                *handle = None;
                Err(anyhow!("Clipboard read failed, reopening next time: {e}"))
            }
        }
    }
}

fn media_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(https?://)?\b((?:www\.|m\.|music\.)?youtube\.com/(?:watch\?|shorts/)[^\s]+|youtu\.be/[^\s]+)",
        )
        .expect("media link pattern is valid")
    })
}

/// Find a supported media link in `text`.
///
/// Recognizes `youtube.com/watch?...`, `youtube.com/shorts/...` and
/// `youtu.be/...` links. The host must start a word, so lookalike hosts such
/// as `notyoutube.com` are not matched. Links copied without a scheme come
/// back with `https://` prepended.
pub fn extract_media_url(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    let caps = media_link_regex().captures(text)?;
    let link = caps.get(2)?.as_str();
    match caps.get(1) {
        Some(scheme) => Some(format!("{}{}", scheme.as_str().to_lowercase(), link)),
        None => Some(format!("https://{link}")),
    }
}

/// What a single clipboard poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Same content as last time, or the clipboard could not be read
    Unchanged,
    /// New content without a media link, including an emptied clipboard
    NoMatch,
    /// New content with a link that was queued; carries the new depth
    Enqueued(usize),
    /// New content with a link that could not be queued
    Rejected(String),
}

/// Polls a [`ClipboardSource`] and queues a request every time the content
/// changes to something holding a media link.
#[derive(Clone)]
pub struct ClipboardWatcher {
    source: Arc<dyn ClipboardSource>,
    queue: TaskQueue,
    bus: StatusBus,
    preset: watch::Receiver<RequestPreset>,
    interval: Duration,
    last_seen: Option<String>,
}

impl ClipboardWatcher {
    pub fn new(
        source: Arc<dyn ClipboardSource>,
        queue: TaskQueue,
        bus: StatusBus,
        preset: watch::Receiver<RequestPreset>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            queue,
            bus,
            preset,
            interval,
            last_seen: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last content seen. Empty and non-text clipboards are seen as `""`.
    pub fn snapshot(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Read the clipboard off the async runtime
    async fn read_source(&self) -> Result<Option<String>> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.read())
            .await
            .map_err(|e| anyhow!("Clipboard read task failed: {e}"))?
    }

    /// Treat whatever is on the clipboard right now as already seen. If the
    /// clipboard cannot be read, nothing counts as seen.
    pub async fn reset_snapshot(&mut self) {
        self.last_seen = match self.read_source().await {
            Ok(current) => Some(current.unwrap_or_default()),
            Err(e) => {
                debug!("{:#}", e);
                None
            }
        };
    }

    /// Read the clipboard once and queue a request if it changed to a link
    pub async fn poll(&mut self) -> PollOutcome {
        let read = self.read_source().await;
        self.observe(read)
    }

    /// Compare one clipboard read with the snapshot and act on a change.
    ///
    /// A failed read leaves the snapshot untouched. An empty or non-text
    /// clipboard is a change like any other, so copying the same link again
    /// afterwards queues it again.
    pub fn observe(&mut self, read: Result<Option<String>>) -> PollOutcome {
        let current = match read {
            Ok(current) => current.unwrap_or_default(),
            Err(e) => {
                debug!("{:#}", e);
                return PollOutcome::Unchanged;
            }
        };
        if self.last_seen.as_deref() == Some(current.as_str()) {
            return PollOutcome::Unchanged;
        }

        let Some(link) = extract_media_url(&current) else {
            self.last_seen = Some(current);
            return PollOutcome::NoMatch;
        };
        self.last_seen = Some(current);

        let preset = *self.preset.borrow();
        let outcome = match preset.request(&link) {
            Ok(request) => {
                let label = request.to_string();
                let bus = &self.bus;
                match self.queue.enqueue_and(request, |depth| {
                    bus.publish(StatusEvent::Enqueued { queue_depth: depth })
                }) {
                    Ok(depth) => {
                        info!("➕ Added to queue from clipboard: {}", label);
                        PollOutcome::Enqueued(depth)
                    }
                    Err(e) => PollOutcome::Rejected(e.to_string()),
                }
            }
            Err(e) => PollOutcome::Rejected(e.to_string()),
        };

        if let PollOutcome::Rejected(reason) = &outcome {
            warn!("⚠️ Could not queue clipboard link {}: {}", link, reason);
        }
        outcome
    }

    /// Poll on a fixed interval until `stop` fires or its sender is dropped
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    self.poll().await;
                }
            }
        }

        debug!("Clipboard watcher stopped");
    }
}
