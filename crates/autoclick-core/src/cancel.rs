//! Cooperative cancellation for background runs
//!
//! Cancelling drops the only sender of a zero-capacity channel, which wakes
//! every sleeper at once.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Returns true if this call is the one that cancelled
    pub fn cancel(&self) -> bool {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.trigger.lock().take().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `dur` unless cancelled first. Returns false if cancelled.
    pub fn sleep(&self, dur: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if dur.is_zero() {
            return true;
        }
        match self.inner.signal.recv_timeout(dur) {
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            _ => false,
        }
    }

    pub fn sleep_secs(&self, secs: f64) -> bool {
        if secs > 0.0 {
            self.sleep(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        } else {
            !self.is_cancelled()
        }
    }

    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if deadline <= now {
            return !self.is_cancelled();
        }
        self.sleep(deadline - now)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
