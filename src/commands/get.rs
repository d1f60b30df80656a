use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{error, info};

use super::observer::ConsoleObserver;
use crate::clipboard::{ClipboardSource, SystemClipboard};
use crate::config::Config;
use crate::executor::{DownloadExecutor, YtDlpExecutor};
use crate::service::DownloadService;
use crate::status::StatusEvent;

/// Queue the given URLs, download them one by one and exit
pub struct GetCommand {
    config: Config,
    urls: Vec<String>,
    json: bool,
}

/// How a batch went
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GetSummary {
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl GetCommand {
    pub fn new(config: Config, urls: Vec<String>, json: bool) -> Self {
        Self { config, urls, json }
    }

    pub async fn execute(&self) -> Result<()> {
        let executor: Arc<dyn DownloadExecutor> =
            Arc::new(YtDlpExecutor::new(self.config.ytdlp_binary.clone()));
        let clipboard: Arc<dyn ClipboardSource> = Arc::new(SystemClipboard::new());

        let summary = self.run(executor, clipboard).await?;
        info!(
            "Done: {} completed, {} failed, {} rejected",
            summary.completed, summary.failed, summary.rejected
        );

        if summary.failed + summary.rejected > 0 {
            return Err(anyhow!(
                "{} of {} downloads did not complete",
                summary.failed + summary.rejected,
                self.urls.len()
            ));
        }
        Ok(())
    }

    /// Submit every URL, drain the queue and tally the outcome
    pub async fn run(
        &self,
        executor: Arc<dyn DownloadExecutor>,
        clipboard: Arc<dyn ClipboardSource>,
    ) -> Result<GetSummary> {
        if self.urls.is_empty() {
            return Err(anyhow!("No URLs given"));
        }

        let service = DownloadService::start(&self.config, executor, clipboard);
        let mut subscription = service.subscribe_channel();
        let mut summary = GetSummary::default();

        for url in &self.urls {
            if let Err(e) = service.submit_url(url) {
                error!("❌ Skipping {}: {}", url, e);
                summary.rejected += 1;
            }
        }

        let observer = ConsoleObserver::new(self.json);
        let render = async {
            let mut completed = 0;
            let mut failed = 0;
            // Ends once the service and its worker are gone
            while let Some(event) = subscription.recv().await {
                observer.handle(&event);
                match event {
                    StatusEvent::Completed { .. } => completed += 1,
                    StatusEvent::Failed { .. } => failed += 1,
                    _ => {}
                }
            }
            (completed, failed)
        };

        let ((), (completed, failed)) = tokio::join!(service.shutdown(), render);
        observer.finish();

        summary.completed = completed;
        summary.failed = failed;
        Ok(summary)
    }
}
