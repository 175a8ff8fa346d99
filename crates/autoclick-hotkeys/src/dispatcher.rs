//! Global hotkey dispatcher
//!
//! Owns the single live chord -> callback mapping. Every rebuild stops the
//! previous listener before the next one subscribes, so two mappings are
//! never live at once.

use crate::chord::{Chord, ChordNormalizer, Normalized};
use crate::registry::SharedRegistry;
use autoclick_core::platform::{InputSource, InputSubscription};
use autoclick_core::{EngineKind, Notifier};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

struct Listener {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Listener {
    fn stop(self) {
        drop(self.stop_tx);
        // Joining from the listener thread itself would never return
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

#[derive(Default)]
struct State {
    suspended: bool,
    pending: bool,
    listener: Option<Listener>,
    live: usize,
}

struct Inner {
    source: Arc<dyn InputSource>,
    registry: SharedRegistry,
    notifier: Notifier,
    callbacks: Mutex<HashMap<(String, String), HotkeyCallback>>,
    state: Mutex<State>,
}

/// Cheap to clone; all clones drive the same listener
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn InputSource>, registry: SharedRegistry, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                registry,
                notifier,
                callbacks: Mutex::new(HashMap::new()),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Register what runs when (group, action)'s chord fires. Takes effect on
    /// the next refresh.
    pub fn bind_action<F>(&self, group: &str, action: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .lock()
            .insert((group.to_string(), action.to_string()), Arc::new(callback));
    }

    /// Rebuild from the registry and reinstall the listener. Returns the
    /// number of live hotkeys; 0 while suspended or when installing failed.
    pub fn refresh(&self) -> usize {
        let mut state = self.inner.state.lock();
        if state.suspended {
            state.pending = true;
            return 0;
        }
        self.rebuild(&mut state)
    }

    /// Stop listening until [`Dispatcher::resume`]
    pub fn suspend(&self) {
        let mut state = self.inner.state.lock();
        state.suspended = true;
        if let Some(l) = state.listener.take() {
            l.stop();
        }
        state.live = 0;
        tracing::debug!("hotkeys suspended");
    }

    /// Lift a suspension and rebuild
    pub fn resume(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.suspended = false;
        state.pending = false;
        self.rebuild(&mut state)
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.state.lock().suspended
    }

    #[cfg(test)]
    fn has_pending_refresh(&self) -> bool {
        self.inner.state.lock().pending
    }

    pub fn live_count(&self) -> usize {
        self.inner.state.lock().live
    }

    /// Drop the listener for good (until the next refresh)
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if let Some(l) = state.listener.take() {
            l.stop();
        }
        state.live = 0;
    }

    fn mapping(&self) -> HashMap<Chord, HotkeyCallback> {
        let registry = self.inner.registry.read();
        let callbacks = self.inner.callbacks.lock();
        let mut mapping: HashMap<Chord, HotkeyCallback> = HashMap::new();
        let mut owners: HashMap<Chord, (String, String)> = HashMap::new();

        for table in registry.tables() {
            for (action, chord) in table.iter() {
                let key = (table.group().to_string(), action.to_string());
                if let Some((g, a)) = owners.get(chord) {
                    tracing::warn!(chord = %chord, kept = %format!("{}.{}", g, a),
                        dropped = %format!("{}.{}", key.0, key.1), "duplicate hotkey dropped");
                    self.inner.notifier.log(
                        EngineKind::Hotkeys,
                        format!("{} is bound twice, ignoring {}.{}", chord, key.0, key.1),
                    );
                    continue;
                }
                owners.insert(chord.clone(), key.clone());
                if let Some(cb) = callbacks.get(&key) {
                    mapping.insert(chord.clone(), cb.clone());
                }
            }
        }
        mapping
    }

    fn rebuild(&self, state: &mut State) -> usize {
        if let Some(l) = state.listener.take() {
            l.stop();
        }
        state.live = 0;

        let mapping = self.mapping();
        if mapping.is_empty() {
            return 0;
        }
        let sub = match self.inner.source.subscribe() {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!(error = %e, "hotkeys unavailable");
                self.inner
                    .notifier
                    .log(EngineKind::Hotkeys, format!("global hotkeys disabled: {}", e.message));
                return 0;
            }
        };

        let count = mapping.len();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let spawned = thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || listen(sub, mapping, stop_rx));
        match spawned {
            Ok(handle) => {
                state.listener = Some(Listener { stop_tx, handle });
                state.live = count;
                tracing::debug!(count, "hotkeys installed");
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not start hotkey listener");
                self.inner
                    .notifier
                    .log(EngineKind::Hotkeys, format!("global hotkeys disabled: {}", e));
                0
            }
        }
    }
}

fn listen(
    sub: InputSubscription,
    mapping: HashMap<Chord, HotkeyCallback>,
    stop_rx: Receiver<()>,
) {
    // Modifiers held across a rebuild still count for the first chord
    let mut normalizer = ChordNormalizer::with_held(sub.snapshot().held.iter().copied());
    loop {
        select! {
            recv(sub.receiver()) -> msg => match msg {
                Ok(event) => {
                    // Stop wins over events already queued
                    if let Err(TryRecvError::Disconnected) = stop_rx.try_recv() {
                        break;
                    }
                    if let Some(Normalized::Chord(chord)) = normalizer.feed(&event) {
                        if let Some(cb) = mapping.get(&chord) {
                            tracing::debug!(%chord, "hotkey fired");
                            cb();
                        }
                    }
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        BindingTable, HotkeyRegistry, ADD_MARKER, CLICKER, RECORDER, START_STOP, TOGGLE_RECORD,
    };
    use autoclick_core::platform::{ChannelSource, InputEvent};
    use autoclick_core::{Key, Modifier};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn fires_bound_callback() {
        let source = Arc::new(ChannelSource::new());
        let dispatcher = Dispatcher::new(
            source.clone(),
            HotkeyRegistry::default().shared(),
            Notifier::disabled(),
        );
        let (hits, cb) = counter();
        dispatcher.bind_action(RECORDER, TOGGLE_RECORD, cb);
        assert_eq!(dispatcher.refresh(), 1);

        source.emit(InputEvent::KeyPressed(Key::Function(9)));
        assert!(wait_until(|| hits.load(Ordering::SeqCst) == 1));

        source.emit(InputEvent::KeyPressed(Key::Modifier(Modifier::Ctrl)));
        source.emit(InputEvent::KeyPressed(Key::Function(9)));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_replaces_the_listener() {
        let source = Arc::new(ChannelSource::new());
        let dispatcher = Dispatcher::new(
            source.clone(),
            HotkeyRegistry::default().shared(),
            Notifier::disabled(),
        );
        dispatcher.bind_action(CLICKER, START_STOP, || {});
        dispatcher.refresh();
        dispatcher.refresh();
        assert_eq!(source.subscriber_count(), 1);
        dispatcher.shutdown();
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn suspended_refresh_is_deferred() {
        let source = Arc::new(ChannelSource::new());
        let dispatcher = Dispatcher::new(
            source.clone(),
            HotkeyRegistry::default().shared(),
            Notifier::disabled(),
        );
        let (hits, cb) = counter();
        dispatcher.bind_action(CLICKER, START_STOP, cb);
        dispatcher.refresh();
        dispatcher.suspend();
        assert_eq!(dispatcher.refresh(), 0);
        assert!(dispatcher.has_pending_refresh());
        assert_eq!(source.subscriber_count(), 0);

        source.emit(InputEvent::KeyPressed(Key::Function(7)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(dispatcher.resume(), 1);
        assert!(!dispatcher.has_pending_refresh());
        source.emit(InputEvent::KeyPressed(Key::Function(7)));
        assert!(wait_until(|| hits.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn modifier_held_across_a_refresh_still_counts() {
        let mut reg = HotkeyRegistry::default();
        reg.assign(CLICKER, START_STOP, "ctrl+f7".parse().unwrap()).unwrap();
        let source = Arc::new(ChannelSource::new());
        let dispatcher = Dispatcher::new(source.clone(), reg.shared(), Notifier::disabled());
        let (hits, cb) = counter();
        dispatcher.bind_action(CLICKER, START_STOP, cb);
        dispatcher.refresh();

        source.emit(InputEvent::KeyPressed(Key::Modifier(Modifier::Ctrl)));
        dispatcher.suspend();
        dispatcher.resume();
        source.emit(InputEvent::KeyPressed(Key::Function(7)));
        assert!(wait_until(|| hits.load(Ordering::SeqCst) == 1));

        source.emit(InputEvent::KeyReleased(Key::Modifier(Modifier::Ctrl)));
        dispatcher.refresh();
        source.emit(InputEvent::KeyPressed(Key::Function(7)));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_chords_keep_the_first_owner() {
        let reg = HotkeyRegistry::new(vec![
            BindingTable::recorder_defaults(),
            BindingTable::new(
                CLICKER,
                &[(START_STOP, Chord::function(9)), (ADD_MARKER, Chord::function(6))],
            ),
        ]);

        let source = Arc::new(ChannelSource::new());
        let dispatcher = Dispatcher::new(source.clone(), reg.shared(), Notifier::disabled());
        let (rec_hits, rec_cb) = counter();
        let (clk_hits, clk_cb) = counter();
        dispatcher.bind_action(RECORDER, TOGGLE_RECORD, rec_cb);
        dispatcher.bind_action(CLICKER, START_STOP, clk_cb);
        assert_eq!(dispatcher.refresh(), 1);

        source.emit(InputEvent::KeyPressed(Key::Function(9)));
        assert!(wait_until(|| rec_hits.load(Ordering::SeqCst) == 1));
        assert_eq!(clk_hits.load(Ordering::SeqCst), 0);
    }
}
