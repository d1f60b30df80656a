//! The single consumer that turns queued requests into downloads.
//!
//! Requests are handled strictly one at a time in queue order. Whatever
//! happens while a request is processed, the outcome is reported on the
//! status bus and the loop moves on to the next request.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::executor::{DownloadExecutor, DownloadOptions, ProgressReport};
use crate::queue::TaskQueue;
use crate::request::Request;
use crate::status::{StatusBus, StatusEvent};

/// Consumer loop configuration and collaborators
pub struct DownloadWorker {
    queue: TaskQueue,
    bus: StatusBus,
    executor: Arc<dyn DownloadExecutor>,
    output_dir: PathBuf,
}

impl DownloadWorker {
    pub fn new(
        queue: TaskQueue,
        bus: StatusBus,
        executor: Arc<dyn DownloadExecutor>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            queue,
            bus,
            executor,
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Start the loop on its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let queue = self.queue.clone();
        let handle = tokio::spawn(self.run(stop_rx));
        WorkerHandle {
            queue,
            stop: stop_tx,
            handle,
        }
    }

    /// Process requests until stopped, or until the queue is closed and
    /// drained
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!("✅ Download worker started, saving to {:?}", self.output_dir);

        loop {
            let request = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                next = self.queue.dequeue() => match next {
                    Some(request) => request,
                    None => {
                        debug!("Queue closed and drained");
                        break;
                    }
                },
            };

            self.process(request).await;
        }

        info!("🛑 Download worker stopped");
    }

    /// Run one request through its whole lifecycle
    pub async fn process(&self, request: Request) {
        info!("➡️ Processing: {}", request);
        self.bus.publish(StatusEvent::Started {
            request: request.clone(),
        });
        self.publish_depth();

        match self.execute(&request).await {
            Ok(()) => {
                info!("✅ Completed: {}", request.source());
                self.bus.publish(StatusEvent::Completed { request });
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!("❌ Download FAILED for {}: {}", request.source(), reason);
                self.bus.publish(StatusEvent::Failed { request, reason });
            }
        }

        self.publish_depth();
    }

    fn publish_depth(&self) {
        let depth = self.queue.size();
        debug!("Items pending in queue: {}", depth);
        self.bus.publish(StatusEvent::Enqueued { queue_depth: depth });
    }

    async fn execute(&self, request: &Request) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let options = DownloadOptions::for_request(request, &self.output_dir);
        debug!("Download options: {:?}", options);

        let executor = Arc::clone(&self.executor);
        let bus = self.bus.clone();
        let source = request.source().to_string();

        // A separate task keeps a panicking executor from taking the loop
        // down with it
        let download = tokio::spawn(async move {
            let on_progress = move |report: ProgressReport| {
                if let Some(percent) = report.percent() {
                    bus.publish(StatusEvent::Progress { percent });
                }
            };
            executor.download(&source, &options, &on_progress).await
        });

        match download.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(anyhow!("download executor panicked")),
            Err(e) => Err(anyhow!("download task was cancelled: {e}")),
        }
    }
}

/// Resolves once a stop has been requested. Never resolves if the handle
/// was dropped without stopping, leaving the worker running.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Handle to a running [`DownloadWorker`]
pub struct WorkerHandle {
    queue: TaskQueue,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Let the in-flight request finish, then exit. Requests still queued
    /// stay in the queue.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        self.join().await;
    }

    /// Close the queue and wait until every queued request has been
    /// processed
    pub async fn shutdown(self) {
        self.queue.close();
        self.join().await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!("Download worker ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{MediaKind, Quality};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Executor that records calls and fails for sources containing "fail"
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, DownloadOptions)>>,
    }

    #[async_trait]
    impl DownloadExecutor for RecordingExecutor {
        async fn download(
            &self,
            source: &str,
            options: &DownloadOptions,
            on_progress: &(dyn Fn(ProgressReport) + Send + Sync),
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((source.to_string(), options.clone()));
            if source.contains("panic") {
                panic!("executor blew up");
            }
            on_progress(ProgressReport::downloading("not a number"));
            on_progress(ProgressReport::downloading(" 40.0%"));
            if source.contains("fail") {
                return Err(anyhow!("network unreachable"));
            }
            on_progress(ProgressReport::finished());
            Ok(())
        }
    }

    fn request(source: &str) -> Request {
        Request::new(source, MediaKind::Video, Quality::Tier(720)).unwrap()
    }

    async fn collect_until_terminal(
        sub: &mut crate::status::Subscription,
        count: usize,
    ) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        let mut terminal = 0;
        while terminal < count {
            let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            if event.is_terminal() {
                terminal += 1;
            }
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_process_success_event_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("Downloads");
        let bus = StatusBus::new();
        let mut sub = bus.subscribe();
        let executor = Arc::new(RecordingExecutor::default());
        let worker = DownloadWorker::new(
            TaskQueue::unbounded(),
            bus,
            executor.clone(),
            output_dir.clone(),
        );

        let r = request("https://youtu.be/abc123");
        worker.process(r.clone()).await;

        let events = collect_until_terminal(&mut sub, 1).await;
        assert_eq!(
            events,
            vec![
                StatusEvent::Started { request: r.clone() },
                StatusEvent::Enqueued { queue_depth: 0 },
                StatusEvent::Progress { percent: 40 },
                StatusEvent::Progress { percent: 100 },
                StatusEvent::Completed { request: r },
            ]
        );
        assert_eq!(
            sub.recv().await,
            Some(StatusEvent::Enqueued { queue_depth: 0 })
        );

        // Output directory is created on demand
        assert!(output_dir.is_dir());
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].1.format, "bestvideo[height<=720]+bestaudio/best");
    }

    #[tokio::test]
    async fn test_existing_output_dir_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let bus = StatusBus::new();
        let mut sub = bus.subscribe();
        let worker = DownloadWorker::new(
            TaskQueue::unbounded(),
            bus,
            Arc::new(RecordingExecutor::default()),
            temp_dir.path().to_path_buf(),
        );

        worker.process(request("https://youtu.be/one")).await;
        worker.process(request("https://youtu.be/two")).await;

        let events = collect_until_terminal(&mut sub, 2).await;
        let completed = events
            .iter()
            .filter(|e| matches!(e, StatusEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 2);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_propagated() {
        let temp_dir = TempDir::new().unwrap();
        let bus = StatusBus::new();
        let mut sub = bus.subscribe();
        let worker = DownloadWorker::new(
            TaskQueue::unbounded(),
            bus,
            Arc::new(RecordingExecutor::default()),
            temp_dir.path().to_path_buf(),
        );

        let r = request("https://youtu.be/fail");
        worker.process(r.clone()).await;

        let events = collect_until_terminal(&mut sub, 1).await;
        assert_eq!(
            events.last().unwrap(),
            &StatusEvent::Failed {
                request: r,
                reason: "network unreachable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_panicking_executor_is_contained() {
        let temp_dir = TempDir::new().unwrap();
        let queue = TaskQueue::unbounded();
        let bus = StatusBus::new();
        let mut sub = bus.subscribe();
        let handle = DownloadWorker::new(
            queue.clone(),
            bus,
            Arc::new(RecordingExecutor::default()),
            temp_dir.path().to_path_buf(),
        )
        .spawn();

        queue.enqueue(request("https://youtu.be/panic")).unwrap();
        queue.enqueue(request("https://youtu.be/after")).unwrap();

        let events = collect_until_terminal(&mut sub, 2).await;
        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert!(matches!(terminal[0], StatusEvent::Failed { reason, .. } if reason.contains("panicked")));
        assert!(matches!(terminal[1], StatusEvent::Completed { request } if request.source() == "https://youtu.be/after"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_fails_request() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let bus = StatusBus::new();
        let mut sub = bus.subscribe();
        let executor = Arc::new(RecordingExecutor::default());
        let worker = DownloadWorker::new(
            TaskQueue::unbounded(),
            bus,
            executor.clone(),
            blocker.join("Downloads"),
        );

        worker.process(request("https://youtu.be/abc123")).await;
        let events = collect_until_terminal(&mut sub, 1).await;
        assert!(matches!(events.last().unwrap(), StatusEvent::Failed { .. }));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let temp_dir = TempDir::new().unwrap();
        let queue = TaskQueue::unbounded();
        let executor = Arc::new(RecordingExecutor::default());
        for i in 0..3 {
            queue.enqueue(request(&format!("https://youtu.be/{i}"))).unwrap();
        }

        let handle = DownloadWorker::new(
            queue.clone(),
            StatusBus::new(),
            executor.clone(),
            temp_dir.path().to_path_buf(),
        )
        .spawn();
        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .unwrap();

        let sources: Vec<_> = executor
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| s.clone())
            .collect();
        assert_eq!(
            sources,
            vec!["https://youtu.be/0", "https://youtu.be/1", "https://youtu.be/2"]
        );
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_stop_leaves_queue_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let queue = TaskQueue::unbounded();
        let handle = DownloadWorker::new(
            queue.clone(),
            StatusBus::new(),
            Arc::new(RecordingExecutor::default()),
            temp_dir.path().to_path_buf(),
        )
        .spawn();

        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .unwrap();

        queue.enqueue(request("https://youtu.be/later")).unwrap();
        assert_eq!(queue.size(), 1);
        assert!(!queue.is_closed());
    }
}
