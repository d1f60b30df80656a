use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::Request;

/// FIFO of pending requests shared between producers and the worker.
///
/// Cloning yields another handle to the same queue. `enqueue` and `size`
/// never suspend; `dequeue` is the only operation that waits.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    available: Notify,
    capacity: Option<usize>,
}

struct State {
    items: VecDeque<Request>,
    closed: bool,
}

impl TaskQueue {
    /// Create a queue with no capacity limit
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue that rejects requests with `QueueFull` once it holds
    /// `capacity` items
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                }),
                available: Notify::new(),
                capacity,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // No critical section can leave the state half-updated
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request and return the new depth
    pub fn enqueue(&self, request: Request) -> Result<usize> {
        self.enqueue_and(request, |_| {})
    }

    /// Append a request and call `announce` with the new depth before any
    /// consumer can take it. `announce` runs under the queue lock and must
    /// not block.
    pub fn enqueue_and<F>(&self, request: Request, announce: F) -> Result<usize>
    where
        F: FnOnce(usize),
    {
        let depth = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::QueueClosed);
            }
            if let Some(capacity) = self.inner.capacity {
                if state.items.len() >= capacity {
                    return Err(Error::QueueFull { capacity });
                }
            }
            debug!("Enqueued request {}: {}", request.id(), request.source());
            state.items.push_back(request);
            let depth = state.items.len();
            announce(depth);
            depth
        };

        self.inner.available.notify_one();
        Ok(depth)
    }

    /// Wait for the next request and remove it from the queue.
    ///
    /// Returns `None` once the queue has been closed and everything left in
    /// it has been handed out.
    pub async fn dequeue(&self) -> Option<Request> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between the check and the
            // await is not lost
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(request) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);
                    if more {
                        // Pass the wakeup on to any other waiting consumer
                        self.inner.available.notify_one();
                    }
                    return Some(request);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Current depth
    pub fn size(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Stop accepting requests. Items already queued can still be dequeued.
    pub fn close(&self) {
        let was_open = {
            let mut state = self.state();
            !std::mem::replace(&mut state.closed, true)
        };
        if was_open {
            debug!("Queue closed");
        }
        self.inner.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}
