use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clipboard::ClipboardWatcher;

struct RunningWatcher {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Turns clipboard watching on and off.
///
/// Starts `Inactive`. Each activation runs a fresh copy of the configured
/// watcher whose snapshot is reset to the clipboard content at that moment,
/// so anything copied while inactive is ignored.
pub struct AutoModeController {
    watcher: ClipboardWatcher,
    running: Mutex<Option<RunningWatcher>>,
    active: AtomicBool,
}

impl AutoModeController {
    pub fn new(watcher: ClipboardWatcher) -> Self {
        Self {
            watcher,
            running: Mutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start watching. Returns `false` if auto mode was already active.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn enable(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let mut watcher = self.watcher.clone();
        watcher.reset_snapshot().await;

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(watcher.run(stop_rx));
        *running = Some(RunningWatcher { stop, handle });
        self.active.store(true, Ordering::SeqCst);

        info!(
            "👀 Auto mode enabled, watching clipboard every {:?}",
            self.watcher.interval()
        );
        true
    }

    /// Stop watching and wait for the polling task to exit, so the clipboard
    /// is not read again once this returns. Returns `false` if auto mode was
    /// already inactive.
    pub async fn disable(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(RunningWatcher { stop, handle }) = running.take() else {
            return false;
        };

        // The task may already be gone if it panicked
        let _ = stop.send(());
        if let Err(e) = handle.await {
            warn!("Clipboard watcher ended abnormally: {}", e);
        }
        self.active.store(false, Ordering::SeqCst);

        info!("🛑 Auto mode stopped");
        true
    }

    /// Enable or disable. Returns `true` if the state changed.
    pub async fn set(&self, active: bool) -> bool {
        if active {
            self.enable().await
        } else {
            self.disable().await
        }
    }
}
