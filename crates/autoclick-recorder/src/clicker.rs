//! Marker click loop

use crate::task::RunSlot;
use autoclick_core::markers::clamp_wait;
use autoclick_core::platform::InputSink;
use autoclick_core::prelude::*;
use autoclick_core::run::clamp_secs;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickOptions {
    pub loops: LoopCount,
    /// Pause before the first click
    pub start_delay: f64,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            loops: LoopCount::Finite(1),
            start_delay: 0.0,
        }
    }
}

/// Clicks through a marker snapshot on a background thread
pub struct ClickRunner {
    sink: Arc<dyn InputSink>,
    notifier: Notifier,
    slot: RunSlot<RunOutcome>,
}

impl ClickRunner {
    pub fn new(sink: Arc<dyn InputSink>, notifier: Notifier) -> Self {
        Self {
            sink,
            notifier,
            slot: RunSlot::new(EngineKind::ClickLoop),
        }
    }

    pub fn start(&mut self, markers: Vec<Marker>, options: ClickOptions) -> Result<()> {
        if markers.is_empty() {
            return Err(Error::no_data("no markers placed"));
        }
        if self.slot.is_running() {
            return Err(Error::busy("Click loop"));
        }
        let sink = self.sink.clone();
        let log = self.notifier.clone();
        self.slot.spawn(self.notifier.clone(), move |cancel, guard| {
            let outcome = run(&markers, options, sink.as_ref(), &cancel, &log);
            match outcome {
                RunOutcome::Completed => log.log(EngineKind::ClickLoop, "click loop finished"),
                RunOutcome::Cancelled => log.log(EngineKind::ClickLoop, "click loop stopped"),
            }
            guard.finish(outcome);
            outcome
        })?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    pub fn stop(&self) -> bool {
        self.slot.stop()
    }

    pub fn join(&mut self) -> Option<RunOutcome> {
        self.slot.join()
    }
}

/// Run the loop on the calling thread
pub fn run(
    markers: &[Marker],
    options: ClickOptions,
    sink: &dyn InputSink,
    cancel: &CancelToken,
    log: &Notifier,
) -> RunOutcome {
    let delay = clamp_secs(options.start_delay, 0.0, f64::MAX);
    if delay > 0.0 {
        log.log(EngineKind::ClickLoop, format!("starting in {:.2}s", delay));
        if !cancel.sleep_secs(delay) {
            return RunOutcome::Cancelled;
        }
    }

    let mut completed = 0u64;
    while options.loops.allows(completed) {
        let n = completed + 1;
        log.log(EngineKind::ClickLoop, format!("loop {} started", n));
        for (i, m) in markers.iter().enumerate() {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if let Err(e) = sink.move_to(m.x, m.y).and_then(|_| sink.click(m.button)) {
                tracing::debug!(error = %e, "click failed");
            }
            log.log(
                EngineKind::ClickLoop,
                format!("click #{} ({}) @ ({}, {})", i + 1, m.button.as_str(), m.x, m.y),
            );
            if !cancel.sleep_secs(clamp_wait(m.wait())) {
                return RunOutcome::Cancelled;
            }
        }
        log.log(EngineKind::ClickLoop, format!("loop {} finished", n));
        completed = n;
    }
    RunOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_core::platform::RecordingSink;

    #[test]
    fn empty_markers_is_no_data() {
        let mut runner = ClickRunner::new(Arc::new(RecordingSink::new()), Notifier::disabled());
        let err = runner.start(Vec::new(), ClickOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoData);
    }

    #[test]
    fn second_start_is_busy() {
        let mut list = MarkerList::new();
        list.add_with(1, 1, MouseButton::Left, 5.0);
        let mut runner = ClickRunner::new(Arc::new(RecordingSink::new()), Notifier::disabled());
        runner.start(list.snapshot(), ClickOptions::default()).unwrap();
        let err = runner.start(list.snapshot(), ClickOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Busy);
        assert!(runner.stop());
        assert_eq!(runner.join(), Some(RunOutcome::Cancelled));
        assert!(!runner.stop());
    }

    #[test]
    fn logs_each_click() {
        let mut list = MarkerList::new();
        list.add_with(7, 8, MouseButton::Right, 0.01);
        let (notifier, rx) = Notifier::channel();
        let sink = RecordingSink::new();
        let outcome = run(&list.snapshot(), ClickOptions::default(), &sink, &CancelToken::new(), &notifier);
        assert_eq!(outcome, RunOutcome::Completed);
        let lines: Vec<String> = rx
            .try_iter()
            .filter_map(|e| match e {
                AppEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(
            lines,
            vec!["loop 1 started", "click #1 (right) @ (7, 8)", "loop 1 finished"]
        );
    }
}
