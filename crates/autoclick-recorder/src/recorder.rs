//! Event recorder: device listener plus idle-position sampler
//!
//! Both threads append to one shared [`Recording`]. The elapsed stamp is taken
//! while holding the lock, so insertion order and stamp order agree.

use autoclick_core::platform::{InputEvent, InputSource};
use autoclick_core::prelude::*;
use autoclick_core::run::clamp_secs;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const MIN_SAMPLE_INTERVAL: f64 = 0.01;
pub const MAX_SAMPLE_INTERVAL: f64 = 1.0;

#[derive(Default)]
struct Capture {
    recording: Recording,
    /// Last pointer position seen, used for button/scroll events and sampling
    pointer: Option<(i32, i32)>,
}

impl Capture {
    fn stamp(&mut self, started: Instant, kind: EventKind) {
        let t = started.elapsed().as_secs_f64();
        self.recording.push(Event::new(t, kind));
    }

    /// Button and wheel events carry the last known pointer position. Until
    /// one is known they are dropped rather than stamped at the origin.
    fn record(&mut self, started: Instant, event: InputEvent) {
        let kind = match event {
            InputEvent::PointerMoved { x, y } => {
                let pos = (x.round() as i32, y.round() as i32);
                self.pointer = Some(pos);
                EventKind::PointerMove { x: pos.0, y: pos.1 }
            }
            InputEvent::KeyPressed(key) => EventKind::KeyDown { key: key.token() },
            InputEvent::KeyReleased(key) => EventKind::KeyUp { key: key.token() },
            positioned => {
                let Some((x, y)) = self.pointer else {
                    tracing::debug!(event = ?positioned, "pointer position unknown, event dropped");
                    return;
                };
                match positioned {
                    InputEvent::ButtonPressed(button) => EventKind::ButtonDown { x, y, button },
                    InputEvent::ButtonReleased(button) => EventKind::ButtonUp { x, y, button },
                    InputEvent::Wheel { dx, dy } => EventKind::Scroll {
                        x,
                        y,
                        dx: saturate(dx),
                        dy: saturate(dy),
                    },
                    _ => return,
                }
            }
        };
        self.stamp(started, kind);
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

struct Session {
    stop_tx: Sender<()>,
    threads: Vec<JoinHandle<()>>,
}

pub struct Recorder {
    source: Arc<dyn InputSource>,
    notifier: Notifier,
    shared: Arc<Mutex<Capture>>,
    session: Option<Session>,
}

impl Recorder {
    pub fn new(source: Arc<dyn InputSource>, notifier: Notifier) -> Self {
        Self {
            source,
            notifier,
            shared: Arc::new(Mutex::new(Capture::default())),
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Start a fresh recording, discarding the previous one.
    /// `sample_interval` is clamped to `[0.01, 1.0]` seconds.
    pub fn start(&mut self, sample_interval: f64) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::busy("Recording"));
        }
        let interval = clamp_secs(sample_interval, MIN_SAMPLE_INTERVAL, MAX_SAMPLE_INTERVAL);
        let sub = self.source.subscribe()?;

        *self.shared.lock() = Capture {
            recording: Recording::new(),
            pointer: sub.snapshot().pointer,
        };
        let started = Instant::now();
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let listener = {
            let shared = self.shared.clone();
            let stop_rx = stop_rx.clone();
            thread::Builder::new()
                .name("recorder-listen".to_string())
                .spawn(move || loop {
                    select! {
                        recv(sub.receiver()) -> msg => match msg {
                            Ok(event) => shared.lock().record(started, event),
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => break,
                    }
                })?
        };
        let sampler = {
            let shared = self.shared.clone();
            thread::Builder::new()
                .name("recorder-sample".to_string())
                .spawn(move || sample(shared, started, interval, stop_rx))?
        };

        self.session = Some(Session {
            stop_tx,
            threads: vec![listener, sampler],
        });
        self.notifier.log(
            EngineKind::Recorder,
            format!("recording started (sample interval {:.2}s)", interval),
        );
        Ok(())
    }

    /// Stop and freeze the recording; returns the event count
    pub fn stop(&mut self) -> usize {
        let Some(session) = self.session.take() else {
            self.notifier.log(EngineKind::Recorder, "not recording");
            return 0;
        };
        drop(session.stop_tx);
        for t in session.threads {
            let _ = t.join();
        }
        let count = self.shared.lock().recording.len();
        self.notifier.log(
            EngineKind::Recorder,
            format!("recording stopped, {} events captured", count),
        );
        self.notifier.ended(EngineKind::Recorder, RunOutcome::Completed);
        count
    }

    /// Copy of the current recording
    pub fn recording(&self) -> Recording {
        self.shared.lock().recording.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().recording.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install a loaded recording. Refused while recording.
    pub fn replace(&mut self, recording: Recording) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::busy("Recording"));
        }
        let count = recording.len();
        self.shared.lock().recording = recording;
        self.notifier
            .log(EngineKind::Recorder, format!("recording loaded, {} events", count));
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session.stop_tx);
            for t in session.threads {
                let _ = t.join();
            }
        }
    }
}

fn sample(shared: Arc<Mutex<Capture>>, started: Instant, interval: f64, stop_rx: Receiver<()>) {
    let every = Duration::from_secs_f64(interval);
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(every) => {
                let mut cap = shared.lock();
                if let Some((x, y)) = cap.pointer {
                    cap.stamp(started, EventKind::PointerMove { x, y });
                }
            }
        }
    }
}
