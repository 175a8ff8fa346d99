//! Rebinding capture: one session per process
//!
//! `Idle -> Capturing -> {Committed | Cancelled}`. While a session is open the
//! dispatcher is suspended and every group's "change hotkey" affordance is
//! disabled. A session ends on the first free chord, on Esc, or on
//! [`CaptureCoordinator::cancel`].

use crate::chord::{Chord, ChordNormalizer, Normalized};
use crate::dispatcher::Dispatcher;
use crate::registry::SharedRegistry;
use autoclick_core::platform::{InputSource, InputSubscription};
use autoclick_core::{AppEvent, CaptureOutcome, EngineKind, Error, ErrorCode, Notifier, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

struct Session {
    id: u64,
    group: String,
    action: String,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slot {
    session: Option<Session>,
    next_id: u64,
}

pub struct CaptureCoordinator {
    source: Arc<dyn InputSource>,
    registry: SharedRegistry,
    dispatcher: Dispatcher,
    notifier: Notifier,
    slot: Mutex<Slot>,
    this: Weak<CaptureCoordinator>,
}

impl CaptureCoordinator {
    pub fn new(
        source: Arc<dyn InputSource>,
        registry: SharedRegistry,
        dispatcher: Dispatcher,
        notifier: Notifier,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            source,
            registry,
            dispatcher,
            notifier,
            slot: Mutex::new(Slot::default()),
            this: this.clone(),
        })
    }

    pub fn is_capturing(&self) -> bool {
        self.slot.lock().session.is_some()
    }

    /// Whether "change hotkey" should be offered for any group right now
    pub fn affordances_enabled(&self) -> bool {
        !self.is_capturing()
    }

    /// (group, action) being captured, if any
    pub fn target(&self) -> Option<(String, String)> {
        self.slot
            .lock()
            .session
            .as_ref()
            .map(|s| (s.group.clone(), s.action.clone()))
    }

    /// Open a session for (group, action). `Busy` if one is already open.
    pub fn begin(&self, group: &str, action: &str) -> Result<()> {
        let mut slot = self.slot.lock();
        if let Some(s) = &slot.session {
            return Err(Error::busy(&format!("Hotkey capture for {}.{}", s.group, s.action)));
        }
        if !self.registry.read().contains(group, action) {
            return Err(Error::invalid_argument(
                "action",
                format!("{}.{} does not exist", group, action),
            ));
        }

        self.dispatcher.suspend();
        let sub = match self.source.subscribe() {
            Ok(sub) => sub,
            Err(e) => {
                drop(slot);
                self.dispatcher.resume();
                return Err(e);
            }
        };

        slot.next_id += 1;
        let id = slot.next_id;
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let this = self.this.clone();
        let (g, a) = (group.to_string(), action.to_string());
        let spawned = thread::Builder::new()
            .name("hotkey-capture".to_string())
            .spawn(move || capture_loop(this, id, g, a, sub, stop_rx));
        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                drop(slot);
                self.dispatcher.resume();
                return Err(e.into());
            }
        };

        slot.session = Some(Session {
            id,
            group: group.to_string(),
            action: action.to_string(),
            stop_tx,
            handle: Some(handle),
        });
        drop(slot);

        self.notifier.send(AppEvent::CaptureStarted {
            group: group.to_string(),
            action: action.to_string(),
        });
        self.notifier.log(
            EngineKind::Capture,
            format!("press a new hotkey for {}.{} (Esc to cancel)", group, action),
        );
        Ok(())
    }

    /// Abort the open session; false if there was none
    pub fn cancel(&self) -> bool {
        let session = self.slot.lock().session.take();
        let Some(mut session) = session else {
            return false;
        };
        drop(session.stop_tx);
        if let Some(h) = session.handle.take() {
            if h.thread().id() != thread::current().id() {
                let _ = h.join();
            }
        }
        self.finished(&session.group, &session.action, CaptureOutcome::Cancelled);
        true
    }

    /// Called from the capture thread. Commits under the slot lock so a
    /// concurrent cancel sees either nothing or a finished session.
    fn try_commit(&self, id: u64, chord: &Chord) -> Option<Result<(String, String)>> {
        let mut slot = self.slot.lock();
        let current = slot.session.as_ref().filter(|s| s.id == id)?;
        let (group, action) = (current.group.clone(), current.action.clone());
        let assigned = self.registry.write().assign(&group, &action, chord.clone());
        match assigned {
            Ok(()) => {
                slot.session = None;
                Some(Ok((group, action)))
            }
            Err(e) => Some(Err(e)),
        }
    }

    fn escape(&self, id: u64) -> Option<(String, String)> {
        let mut slot = self.slot.lock();
        if slot.session.as_ref().map(|s| s.id) != Some(id) {
            return None;
        }
        slot.session.take().map(|s| (s.group, s.action))
    }

    fn finished(&self, group: &str, action: &str, outcome: CaptureOutcome) {
        match &outcome {
            CaptureOutcome::Committed { chord } => self
                .notifier
                .log(EngineKind::Capture, format!("{}.{} is now {}", group, action, chord)),
            CaptureOutcome::Cancelled => self
                .notifier
                .log(EngineKind::Capture, format!("capture for {}.{} cancelled", group, action)),
        }
        self.notifier.send(AppEvent::CaptureFinished {
            group: group.to_string(),
            action: action.to_string(),
            outcome,
        });
        self.notifier.send(AppEvent::BindingsChanged {
            group: group.to_string(),
        });
        self.dispatcher.resume();
    }
}

impl Drop for CaptureCoordinator {
    fn drop(&mut self) {
        // The capture thread only holds a weak handle; wake it so it exits
        if let Some(session) = self.slot.get_mut().session.take() {
            drop(session.stop_tx);
        }
    }
}

fn capture_loop(
    this: Weak<CaptureCoordinator>,
    id: u64,
    group: String,
    action: String,
    sub: InputSubscription,
    stop_rx: Receiver<()>,
) {
    let mut normalizer = ChordNormalizer::with_held(sub.snapshot().held.iter().copied());
    loop {
        let event = select! {
            recv(sub.receiver()) -> msg => match msg {
                Ok(e) => e,
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
        };
        let Some(normalized) = normalizer.feed(&event) else {
            continue;
        };
        let Some(coordinator) = this.upgrade() else {
            break;
        };
        match normalized {
            Normalized::Escape => {
                if let Some((g, a)) = coordinator.escape(id) {
                    drop(sub);
                    coordinator.finished(&g, &a, CaptureOutcome::Cancelled);
                }
                return;
            }
            Normalized::Chord(chord) => match coordinator.try_commit(id, &chord) {
                None => return,
                Some(Ok((g, a))) => {
                    drop(sub);
                    coordinator.finished(
                        &g,
                        &a,
                        CaptureOutcome::Committed {
                            chord: chord.to_string(),
                        },
                    );
                    return;
                }
                Some(Err(e)) if e.code == ErrorCode::Conflict => {
                    coordinator.notifier.log(
                        EngineKind::Capture,
                        format!("{}, try another combination", e.message),
                    );
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, %group, %action, "capture rejected chord");
                }
            },
        }
    }
}
