use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::status::StatusEvent;

/// Renders status events on the terminal, either as a progress bar or as
/// JSON lines on stdout
#[derive(Clone)]
pub struct ConsoleObserver {
    bar: ProgressBar,
    json: bool,
}

impl ConsoleObserver {
    pub fn new(json: bool) -> Self {
        let bar = if json {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            match ProgressStyle::with_template("{prefix} {msg} [{bar:30}] {pos:>3}%") {
                Ok(style) => bar.set_style(style.progress_chars("=> ")),
                Err(e) => warn!("Falling back to the default progress style: {}", e),
            }
            bar.set_prefix(queue_label(0));
            bar
        };
        Self { bar, json }
    }

    pub fn handle(&self, event: &StatusEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Could not serialize event: {}", e),
            }
            return;
        }

        match event {
            StatusEvent::Enqueued { queue_depth } => self.bar.set_prefix(queue_label(*queue_depth)),
            StatusEvent::Started { request } => {
                self.bar.reset();
                self.bar.set_message(request.source().to_string());
            }
            StatusEvent::Progress { percent } => self.bar.set_position(u64::from(*percent)),
            StatusEvent::Completed { request } => {
                self.bar.set_position(100);
                self.bar.println(format!("✓ Download complete: {}", request.source()));
            }
            StatusEvent::Failed { request, reason } => {
                self.bar.println(format!("✗ Error: {}: {}", request.source(), reason));
            }
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn queue_label(depth: usize) -> String {
    let plural = if depth == 1 { "" } else { "s" };
    format!("Queue: {depth} item{plural}")
}
