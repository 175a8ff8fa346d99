//! Capture -> registry -> dispatcher, end to end over an in-process source

use autoclick_core::platform::{ChannelSource, InputEvent};
use autoclick_core::prelude::*;
use autoclick_core::{AppConfig, CaptureOutcome};
use autoclick_hotkeys::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct App {
    source: Arc<ChannelSource>,
    registry: SharedRegistry,
    dispatcher: Dispatcher,
    capture: Arc<CaptureCoordinator>,
    events: autoclick_core::notify::Receiver<AppEvent>,
    record_hits: Arc<AtomicUsize>,
    click_hits: Arc<AtomicUsize>,
}

fn app(config: &AppConfig) -> App {
    let source = Arc::new(ChannelSource::new());
    let (registry, _, _) = HotkeyRegistry::from_config(config);
    let registry = registry.shared();
    let (notifier, events) = Notifier::channel();
    let dispatcher = Dispatcher::new(source.clone(), registry.clone(), notifier.clone());

    let record_hits = Arc::new(AtomicUsize::new(0));
    let click_hits = Arc::new(AtomicUsize::new(0));
    let r = record_hits.clone();
    dispatcher.bind_action(RECORDER, TOGGLE_RECORD, move || {
        r.fetch_add(1, Ordering::SeqCst);
    });
    let c = click_hits.clone();
    dispatcher.bind_action(CLICKER, START_STOP, move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    dispatcher.refresh();

    let capture = CaptureCoordinator::new(source.clone(), registry.clone(), dispatcher.clone(), notifier);
    App { source, registry, dispatcher, capture, events, record_hits, click_hits }
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

fn press(source: &ChannelSource, keys: &[Key]) {
    for k in keys {
        source.emit(InputEvent::KeyPressed(k.clone()));
    }
    for k in keys.iter().rev() {
        source.emit(InputEvent::KeyReleased(k.clone()));
    }
}

#[test]
fn rebound_chord_fires_the_new_action_only() {
    let a = app(&AppConfig::default());
    a.capture.begin(RECORDER, TOGGLE_RECORD).unwrap();
    press(&a.source, &[Key::Modifier(Modifier::Ctrl), Key::Char('r')]);
    assert!(wait_until(|| !a.capture.is_capturing()));
    assert!(wait_until(|| a.dispatcher.live_count() == 2));

    // Old chord is gone
    press(&a.source, &[Key::Function(9)]);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(a.record_hits.load(Ordering::SeqCst), 0);

    press(&a.source, &[Key::Modifier(Modifier::Ctrl), Key::Char('r')]);
    assert!(wait_until(|| a.record_hits.load(Ordering::SeqCst) == 1));
    assert_eq!(a.click_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn hotkeys_are_silent_while_capturing() {
    let a = app(&AppConfig::default());
    a.capture.begin(RECORDER, TOGGLE_PLAY).unwrap();
    // f7 is taken by clicker.start_stop: rejected, and must not fire either
    press(&a.source, &[Key::Function(7)]);
    thread::sleep(Duration::from_millis(40));
    assert!(a.capture.is_capturing());
    assert_eq!(a.click_hits.load(Ordering::SeqCst), 0);

    let conflict_logged = a.events.try_iter().any(|e| match e {
        AppEvent::Log { message, .. } => message.contains("already used by clicker.start_stop"),
        _ => false,
    });
    assert!(conflict_logged);

    press(&a.source, &[Key::Escape]);
    assert!(wait_until(|| !a.capture.is_capturing()));
    assert!(wait_until(|| !a.dispatcher.is_suspended()));
    press(&a.source, &[Key::Function(7)]);
    assert!(wait_until(|| a.click_hits.load(Ordering::SeqCst) == 1));
}

#[test]
fn one_capture_at_a_time_across_groups() {
    let a = app(&AppConfig::default());
    a.capture.begin(CLICKER, ADD_MARKER).unwrap();
    assert!(!a.capture.affordances_enabled());
    let err = a.capture.begin(RECORDER, TOGGLE_RECORD).unwrap_err();
    assert_eq!(err.code, ErrorCode::Busy);
    assert_eq!(a.capture.target(), Some((CLICKER.to_string(), ADD_MARKER.to_string())));

    press(&a.source, &[Key::Modifier(Modifier::Alt), Key::Char('m')]);
    assert!(wait_until(|| !a.capture.is_capturing()));
    assert!(a.capture.affordances_enabled());
    assert_eq!(
        a.registry.read().table(CLICKER).unwrap().get(ADD_MARKER).map(|c| c.to_string()),
        Some("alt+m".to_string())
    );
    let finished: Vec<CaptureOutcome> = a
        .events
        .try_iter()
        .filter_map(|e| match e {
            AppEvent::CaptureFinished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![CaptureOutcome::Committed { chord: "alt+m".into() }]);
}

#[test]
fn repaired_config_dispatches_every_action() {
    let mut config = AppConfig::default();
    config.recorder.hotkeys.insert(TOGGLE_RECORD.into(), "<f7>".into());
    let a = app(&config);
    // recorder.toggle_record moved to f9, clicker keeps f7
    press(&a.source, &[Key::Function(9)]);
    press(&a.source, &[Key::Function(7)]);
    assert!(wait_until(|| a.record_hits.load(Ordering::SeqCst) == 1));
    assert!(wait_until(|| a.click_hits.load(Ordering::SeqCst) == 1));
}
