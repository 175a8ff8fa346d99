//! Timed playback of recordings through an [`InputSink`]

use crate::task::RunSlot;
use autoclick_core::platform::InputSink;
use autoclick_core::prelude::*;
use autoclick_core::run::clamp_secs;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Replays events with their recorded spacing, scaled by `speed`.
///
/// Waits are measured against a deadline accumulated from the loop start, so
/// oversleeping on one event shortens the next wait instead of drifting.
#[derive(Debug, Clone, Copy)]
pub struct Replayer {
    speed: f64,
    loops: LoopCount,
    gap: f64,
    delay: f64,
}

impl Replayer {
    pub fn new() -> Self {
        Self {
            speed: 1.0,
            loops: LoopCount::Finite(1),
            gap: 0.0,
            delay: 0.0,
        }
    }

    /// Set playback speed (1.0 = real-time, 2.0 = 2x speed)
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn loops(mut self, loops: LoopCount) -> Self {
        self.loops = loops;
        self
    }

    /// Pause between loops, only taken when another loop follows
    pub fn gap(mut self, secs: f64) -> Self {
        self.gap = secs;
        self
    }

    /// One-time pause before the first loop
    pub fn delay(mut self, secs: f64) -> Self {
        self.delay = secs;
        self
    }

    /// Reject a non-positive speed, clamp gap and delay to >= 0
    pub fn validated(self) -> Result<Self> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::invalid_argument(
                "speed",
                format!("{} (must be a positive number)", self.speed),
            ));
        }
        Ok(Self {
            gap: clamp_secs(self.gap, 0.0, f64::MAX),
            delay: clamp_secs(self.delay, 0.0, f64::MAX),
            ..self
        })
    }

    /// Play `events` on the calling thread until done or cancelled
    pub fn play(
        &self,
        events: &[Event],
        sink: &dyn InputSink,
        cancel: &CancelToken,
        log: &Notifier,
    ) -> ReplayStats {
        let mut stats = ReplayStats::default();

        if self.delay > 0.0 {
            log.log(EngineKind::Playback, format!("waiting {:.2}s before playback", self.delay));
            if !cancel.sleep_secs(self.delay) {
                return stats.cancelled();
            }
        }

        while self.loops.allows(stats.loops) {
            if cancel.is_cancelled() {
                return stats.cancelled();
            }
            let n = stats.loops + 1;
            log.log(EngineKind::Playback, format!("loop {} started", n));

            let loop_start = Instant::now();
            let mut target = 0.0;
            let mut prev_t = 0.0;
            for event in events {
                target += (event.t - prev_t).max(0.0) / self.speed;
                prev_t = event.t;
                if !sleep_until_offset(cancel, loop_start, target) {
                    return stats.cancelled();
                }
                self.apply(event, sink, &mut stats);
            }

            stats.loops = n;
            log.log(EngineKind::Playback, format!("loop {} finished", n));

            if self.loops.allows(stats.loops) && self.gap > 0.0 && !cancel.sleep_secs(self.gap) {
                return stats.cancelled();
            }
        }

        stats
    }

    fn apply(&self, event: &Event, sink: &dyn InputSink, stats: &mut ReplayStats) {
        let result = match &event.kind {
            EventKind::PointerMove { x, y } => {
                stats.moves += 1;
                sink.move_to(*x, *y)
            }
            EventKind::ButtonDown { button, .. } => {
                stats.presses += 1;
                sink.press_button(*button)
            }
            EventKind::ButtonUp { button, .. } => {
                stats.releases += 1;
                sink.release_button(*button)
            }
            EventKind::Scroll { x, y, dx, dy } => {
                stats.scrolls += 1;
                sink.move_to(*x, *y).and_then(|_| sink.scroll(*dx, *dy))
            }
            EventKind::KeyDown { key } => match Key::from_token(key) {
                Some(k) => {
                    stats.keys += 1;
                    sink.press_key(&k)
                }
                None => {
                    stats.skipped += 1;
                    Ok(())
                }
            },
            EventKind::KeyUp { key } => match Key::from_token(key) {
                Some(k) => sink.release_key(&k),
                None => {
                    stats.skipped += 1;
                    Ok(())
                }
            },
        };
        // Injection is best-effort
        if let Err(e) = result {
            tracing::debug!(error = %e, event = event.kind.name(), "injection failed");
        }
    }
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

fn sleep_until_offset(cancel: &CancelToken, start: Instant, secs: f64) -> bool {
    match Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|d| start.checked_add(d))
    {
        Some(deadline) => cancel.sleep_until(deadline),
        None => cancel.sleep(Duration::MAX),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub moves: usize,
    pub presses: usize,
    pub releases: usize,
    pub scrolls: usize,
    pub keys: usize,
    /// Key events whose token could not be mapped
    pub skipped: usize,
    pub loops: u64,
    pub cancelled: bool,
}

impl ReplayStats {
    fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        }
    }
}

/// Background playback engine: at most one run at a time
pub struct Player {
    sink: Arc<dyn InputSink>,
    notifier: Notifier,
    slot: RunSlot<ReplayStats>,
}

impl Player {
    pub fn new(sink: Arc<dyn InputSink>, notifier: Notifier) -> Self {
        Self {
            sink,
            notifier,
            slot: RunSlot::new(EngineKind::Playback),
        }
    }

    /// Snapshot `recording` and start playing it in the background.
    /// Returns as soon as the task is launched.
    pub fn start(&mut self, recording: &Recording, replayer: Replayer) -> Result<()> {
        if recording.is_empty() {
            return Err(Error::no_data("the recording is empty"));
        }
        if self.slot.is_running() {
            return Err(Error::busy("Playback"));
        }
        let replayer = replayer.validated()?;
        let events = recording.snapshot();
        let sink = self.sink.clone();
        let log = self.notifier.clone();

        log.log(
            EngineKind::Playback,
            format!(
                "playback started ({} events, speed {}x, loops {})",
                events.len(),
                replayer.speed,
                replayer.loops
            ),
        );
        self.slot.spawn(self.notifier.clone(), move |cancel, guard| {
            let stats = replayer.play(&events, sink.as_ref(), &cancel, &log);
            if stats.cancelled {
                log.log(EngineKind::Playback, "playback stopped");
            } else {
                log.log(EngineKind::Playback, "playback finished");
            }
            guard.finish(stats.outcome());
            stats
        })?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    /// Request cancellation; true if a run was active
    pub fn stop(&self) -> bool {
        self.slot.stop()
    }

    /// Block until the current run ends and return its statistics
    pub fn join(&mut self) -> Option<ReplayStats> {
        self.slot.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_core::platform::{InjectedAction, RecordingSink};

    fn recording(events: Vec<Event>) -> Recording {
        Recording::from_events(events).unwrap()
    }

    #[test]
    fn rejects_bad_speed() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = Replayer::new().speed(speed).validated().unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidArgument);
        }
        let r = Replayer::new().gap(-3.0).delay(f64::NAN).validated().unwrap();
        assert_eq!((r.gap, r.delay), (0.0, 0.0));
    }

    #[test]
    fn empty_recording_is_no_data() {
        let mut player = Player::new(Arc::new(RecordingSink::new()), Notifier::disabled());
        let err = player.start(&Recording::new(), Replayer::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoData);
    }

    #[test]
    fn unknown_key_tokens_are_skipped() {
        let sink = RecordingSink::new();
        let events = vec![
            Event::new(0.0, EventKind::KeyDown { key: "".into() }),
            Event::new(0.0, EventKind::KeyDown { key: "a".into() }),
            Event::new(0.0, EventKind::KeyUp { key: "a".into() }),
        ];
        let stats = Replayer::new().play(&events, &sink, &CancelToken::new(), &Notifier::disabled());
        assert_eq!(stats.skipped, 1);
        assert_eq!(
            sink.actions(),
            vec![
                InjectedAction::KeyDown(Key::Char('a')),
                InjectedAction::KeyUp(Key::Char('a'))
            ]
        );
    }

    #[test]
    fn scroll_moves_first() {
        let sink = RecordingSink::new();
        let events = vec![Event::new(0.0, EventKind::Scroll { x: 3, y: 4, dx: 0, dy: -2 })];
        Replayer::new().play(&events, &sink, &CancelToken::new(), &Notifier::disabled());
        assert_eq!(
            sink.actions(),
            vec![
                InjectedAction::MoveTo { x: 3, y: 4 },
                InjectedAction::Scroll { dx: 0, dy: -2 }
            ]
        );
    }

    #[test]
    fn zero_loops_ends_immediately() {
        let (notifier, rx) = Notifier::channel();
        let sink = Arc::new(RecordingSink::new());
        let mut player = Player::new(sink.clone(), notifier);
        let rec = recording(vec![Event::new(0.0, EventKind::PointerMove { x: 1, y: 1 })]);
        player.start(&rec, Replayer::new().loops(LoopCount::Finite(0))).unwrap();
        let stats = player.join().unwrap();
        assert_eq!(stats.loops, 0);
        assert!(sink.is_empty());
        let ended: Vec<_> = rx
            .try_iter()
            .filter(|e| matches!(e, AppEvent::Ended { .. }))
            .collect();
        assert_eq!(
            ended,
            vec![AppEvent::Ended { source: EngineKind::Playback, outcome: RunOutcome::Completed }]
        );
    }

    #[test]
    fn gap_only_between_loops() {
        let sink = RecordingSink::new();
        let events = vec![Event::new(0.0, EventKind::PointerMove { x: 1, y: 1 })];
        let start = Instant::now();
        let stats = Replayer::new()
            .loops(LoopCount::Finite(2))
            .gap(0.15)
            .play(&events, &sink, &CancelToken::new(), &Notifier::disabled());
        let elapsed = start.elapsed();
        assert_eq!(stats.loops, 2);
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(290));
    }
}
