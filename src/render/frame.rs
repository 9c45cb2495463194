//! Frame scheduling for coalesced re-renders.
//!
//! A reactive list requests a frame on every change and cancels the
//! previous request, so a burst of changes produces a single render pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Callback run once when a frame fires.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Identifies a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Schedules callbacks for the next frame.
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` at the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Drop a pending request. No-op once it has run.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Default delay between a request and its frame.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Tokio-timer frames: each request fires after a fixed interval.
///
/// Without a tokio runtime the callback runs immediately.
#[derive(Debug)]
pub struct IntervalFrames {
    interval: Duration,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl Default for IntervalFrames {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl IntervalFrames {
    /// Frames fire `interval` after being requested.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of requests that have neither fired nor been cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameScheduler for IntervalFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("[Companion/render] No async runtime, running frame #{} now", id);
            callback();
            return FrameHandle(id);
        };

        let interval = self.interval;
        let pending = Arc::clone(&self.pending);
        // Held across spawn so the task cannot remove its entry before it
        // is inserted.
        let mut guard = lock(&self.pending);
        let task = runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            let still_pending = lock(&pending).remove(&id).is_some();
            if still_pending {
                callback();
            }
        });
        guard.insert(id, task);
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Some(task) = lock(&self.pending).remove(&handle.0) {
            task.abort();
        }
    }
}

/// Frames driven by the host: requests queue until [`ManualFrames::run_frame`].
#[derive(Default)]
pub struct ManualFrames {
    next_id: AtomicU64,
    queue: Mutex<Vec<(u64, FrameCallback)>>,
}

impl std::fmt::Debug for ManualFrames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualFrames")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl ManualFrames {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued callback. Returns how many ran.
    ///
    /// Requests made while the frame runs wait for the next frame.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut *lock(&self.queue));
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }

    /// Number of queued callbacks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.queue).push((id, callback));
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        lock(&self.queue).retain(|(id, _)| *id != handle.0);
    }
}
