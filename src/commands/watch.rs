use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use super::observer::ConsoleObserver;
use crate::clipboard::{ClipboardSource, SystemClipboard};
use crate::config::Config;
use crate::executor::{DownloadExecutor, YtDlpExecutor};
use crate::service::DownloadService;

/// Watch the clipboard and download every media link copied until Ctrl-C
pub struct WatchCommand {
    config: Config,
    json: bool,
}

impl WatchCommand {
    pub fn new(mut config: Config, interval_ms: Option<u64>, json: bool) -> Self {
        if let Some(ms) = interval_ms.filter(|ms| *ms > 0) {
            config.poll_interval = Duration::from_millis(ms);
        }
        Self { config, json }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn execute(&self) -> Result<()> {
        let executor: Arc<dyn DownloadExecutor> =
            Arc::new(YtDlpExecutor::new(self.config.ytdlp_binary.clone()));
        let clipboard: Arc<dyn ClipboardSource> = Arc::new(SystemClipboard::new());
        self.run(executor, clipboard, signal::ctrl_c()).await
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(
        &self,
        executor: Arc<dyn DownloadExecutor>,
        clipboard: Arc<dyn ClipboardSource>,
        shutdown: F,
    ) -> Result<()>
    where
        F: std::future::Future<Output = std::io::Result<()>>,
    {
        let service = DownloadService::start(&self.config, executor, clipboard);

        let observer = ConsoleObserver::new(self.json);
        let subscription = {
            let observer = observer.clone();
            service.subscribe(move |event| observer.handle(&event))
        };

        service.set_auto_mode(true).await;
        info!(
            "📋 Copy media links to queue them ({} at {}). Press Ctrl+C to stop.",
            self.config.preset.media_kind, self.config.preset.quality
        );

        let result = shutdown.await;
        info!("🛑 Shutdown signal received. Exiting gracefully.");

        service.unsubscribe(subscription);
        service.stop().await;
        observer.finish();

        result.map_err(|e| anyhow!("Failed to listen for shutdown signal: {e}"))
    }
}
