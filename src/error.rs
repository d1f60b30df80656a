use thiserror::Error;

/// Errors raised when a request is built or handed to the queue.
///
/// Failures that happen while a request is being downloaded never show up
/// here; the worker reports them as `StatusEvent::Failed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Empty or malformed source, unknown quality selector
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Only produced by a bounded queue
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("queue is closed")]
    QueueClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
