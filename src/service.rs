use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::automode::AutoModeController;
use crate::clipboard::{ClipboardSource, ClipboardWatcher};
use crate::config::Config;
use crate::error::Result;
use crate::executor::DownloadExecutor;
use crate::queue::TaskQueue;
use crate::request::{Request, RequestPreset};
use crate::status::{StatusBus, StatusEvent, Subscription, SubscriptionId};
use crate::worker::{DownloadWorker, WorkerHandle};

/// Everything a front end talks to: submission, status subscriptions, queue
/// depth and the auto mode switch.
///
/// The download worker starts with the service and runs until [`stop`] or
/// [`shutdown`].
///
/// [`stop`]: DownloadService::stop
/// [`shutdown`]: DownloadService::shutdown
pub struct DownloadService {
    queue: TaskQueue,
    bus: StatusBus,
    preset: watch::Sender<RequestPreset>,
    auto_mode: AutoModeController,
    worker: WorkerHandle,
}

impl DownloadService {
    /// Wire up the queue, bus, watcher and worker, and start the worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &Config,
        executor: Arc<dyn DownloadExecutor>,
        clipboard: Arc<dyn ClipboardSource>,
    ) -> Self {
        let queue = TaskQueue::with_capacity(config.queue_capacity);
        let bus = StatusBus::new();
        let (preset, preset_rx) = watch::channel(config.preset);

        let watcher = ClipboardWatcher::new(
            clipboard,
            queue.clone(),
            bus.clone(),
            preset_rx,
            config.poll_interval,
        );
        let worker = DownloadWorker::new(
            queue.clone(),
            bus.clone(),
            executor,
            config.download_dir.clone(),
        )
        .spawn();

        Self {
            queue,
            bus,
            preset,
            auto_mode: AutoModeController::new(watcher),
            worker,
        }
    }

    /// Call `handler` for every event from now on, on a separate task
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(StatusEvent) + Send + 'static,
    {
        self.bus.subscribe_fn(handler)
    }

    /// Receive every event from now on through a channel
    pub fn subscribe_channel(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Queue a request and return the new depth
    pub fn submit(&self, request: Request) -> Result<usize> {
        let label = request.to_string();
        let depth = self.queue.enqueue_and(request, |depth| {
            self.bus.publish(StatusEvent::Enqueued { queue_depth: depth })
        })?;
        info!("➕ Added to queue: {}", label);
        Ok(depth)
    }

    /// Build a request from the current preset and queue it
    pub fn submit_url(&self, source: &str) -> Result<usize> {
        let request = self.preset().request(source)?;
        self.submit(request)
    }

    pub fn current_queue_depth(&self) -> usize {
        self.queue.size()
    }

    /// Turn clipboard watching on or off. Returns `true` if the state
    /// changed.
    pub async fn set_auto_mode(&self, active: bool) -> bool {
        self.auto_mode.set(active).await
    }

    pub fn auto_mode_active(&self) -> bool {
        self.auto_mode.is_active()
    }

    /// Media kind and quality for requests picked up from the clipboard
    pub fn set_preset(&self, preset: RequestPreset) {
        self.preset.send_replace(preset);
    }

    pub fn preset(&self) -> RequestPreset {
        *self.preset.borrow()
    }

    /// Turn auto mode off and stop the worker once the in-flight request is
    /// done. Queued requests are dropped with the service.
    pub async fn stop(self) {
        self.auto_mode.disable().await;
        self.worker.stop().await;
    }

    /// Turn auto mode off, refuse new requests and wait until every queued
    /// request has been processed
    pub async fn shutdown(self) {
        self.auto_mode.disable().await;
        self.worker.shutdown().await;
    }
}
