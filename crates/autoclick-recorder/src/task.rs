//! Single background run per engine

use autoclick_core::{CancelToken, EngineKind, Notifier, RunOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Sends the end notification exactly once when dropped, also on unwind.
/// A run that never called [`EndGuard::finish`] is reported as cancelled.
pub(crate) struct EndGuard {
    source: EngineKind,
    notifier: Notifier,
    alive: Arc<AtomicBool>,
    outcome: Option<RunOutcome>,
}

impl EndGuard {
    pub(crate) fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        let outcome = self.outcome.unwrap_or(RunOutcome::Cancelled);
        self.notifier.ended(self.source, outcome);
    }
}

struct Active<T> {
    cancel: CancelToken,
    alive: Arc<AtomicBool>,
    handle: JoinHandle<T>,
}

/// Holds at most one running task and its cancel token
pub(crate) struct RunSlot<T> {
    source: EngineKind,
    active: Option<Active<T>>,
}

impl<T: Send + 'static> RunSlot<T> {
    pub(crate) fn new(source: EngineKind) -> Self {
        Self { source, active: None }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Spawn `body` unless a run is alive. The caller checks `is_running` first.
    pub(crate) fn spawn<F>(&mut self, notifier: Notifier, body: F) -> std::io::Result<()>
    where
        F: FnOnce(CancelToken, &mut EndGuard) -> T + Send + 'static,
    {
        // Reap a finished run so its thread handle is not leaked
        if let Some(done) = self.active.take() {
            let _ = done.handle.join();
        }

        let cancel = CancelToken::new();
        let alive = Arc::new(AtomicBool::new(true));
        let mut guard = EndGuard {
            source: self.source,
            notifier,
            alive: alive.clone(),
            outcome: None,
        };
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-run", self.source))
            .spawn(move || body(token, &mut guard))?;

        self.active = Some(Active { cancel, alive, handle });
        Ok(())
    }

    /// Cooperative cancel; true if a run was alive
    pub(crate) fn stop(&self) -> bool {
        match &self.active {
            Some(a) if a.alive.load(Ordering::SeqCst) => {
                a.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Wait for the current run. `None` if there was none or it panicked.
    pub(crate) fn join(&mut self) -> Option<T> {
        let active = self.active.take()?;
        active.handle.join().ok()
    }
}

impl<T> Drop for RunSlot<T> {
    fn drop(&mut self) {
        if let Some(a) = &self.active {
            a.cancel.cancel();
        }
    }
}
