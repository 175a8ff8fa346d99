//! Foreground controller for `autoclick run`
//!
//! Owns both pages, the hotkey registry, dispatcher and capture coordinator.
//! Everything that touches page state happens on the thread running
//! [`App::run`]; background work only reaches it through [`AppEvent`]s.

use crate::commands::Command;
use crate::logging;
use crate::pages::{ClickerPage, RecorderPage};
use autoclick_core::notify::Receiver;
use autoclick_core::platform::{InputSink, InputSource};
use autoclick_core::prelude::*;
use autoclick_core::{AppConfig, ConfigStore};
use autoclick_hotkeys::prelude::*;
use crossbeam_channel::{never, select};
use std::sync::Arc;

pub struct App {
    store: ConfigStore,
    config: AppConfig,
    registry: SharedRegistry,
    dispatcher: Dispatcher,
    capture: Arc<CaptureCoordinator>,
    recorder: RecorderPage,
    clicker: ClickerPage,
    notifier: Notifier,
    events: Receiver<AppEvent>,
}

impl App {
    pub fn new(store: ConfigStore, source: Arc<dyn InputSource>, sink: Arc<dyn InputSink>) -> Self {
        let config = store.load();
        let (notifier, events) = Notifier::channel();

        let registry = HotkeyRegistry::default().shared();
        let dispatcher = Dispatcher::new(source.clone(), registry.clone(), notifier.clone());
        for (group, action) in [
            (RECORDER, TOGGLE_RECORD),
            (RECORDER, TOGGLE_PLAY),
            (CLICKER, START_STOP),
            (CLICKER, ADD_MARKER),
        ] {
            let n = notifier.clone();
            // Runs on the listener thread: hand off to the foreground only
            dispatcher.bind_action(group, action, move || {
                n.send(AppEvent::Hotkey {
                    group: group.to_string(),
                    action: action.to_string(),
                })
            });
        }
        let capture = CaptureCoordinator::new(
            source.clone(),
            registry.clone(),
            dispatcher.clone(),
            notifier.clone(),
        );

        let recorder = RecorderPage::new(source.clone(), sink.clone(), &config.recorder, notifier.clone());
        let clicker = ClickerPage::new(source.as_ref(), sink, &config.clicker, notifier.clone());

        let mut app = Self {
            store,
            config,
            registry,
            dispatcher,
            capture,
            recorder,
            clicker,
            notifier,
            events,
        };
        app.reload_bindings();
        app.reload_last_recording();
        app
    }

    /// Rebuild the registry from the config, repairing duplicates
    fn reload_bindings(&mut self) {
        let (registry, repairs, warnings) = HotkeyRegistry::from_config(&self.config);
        for w in &warnings {
            logging::print_line(EngineKind::Hotkeys, w);
        }
        for r in &repairs {
            logging::print_line(
                EngineKind::Hotkeys,
                &format!("{}.{} was {}, a duplicate; now {}", r.group, r.action, r.from, r.to),
            );
        }
        *self.registry.write() = registry;
        if !repairs.is_empty() || !warnings.is_empty() {
            self.persist();
        }
        let live = self.dispatcher.refresh();
        logging::print_line(EngineKind::Hotkeys, &format!("{} global hotkeys active", live));
        self.print_bindings();
    }

    fn reload_last_recording(&mut self) {
        let Some(path) = self.recorder.last_file.clone() else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(e) = self.recorder.load(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not reload last recording");
        }
    }

    fn print_bindings(&self) {
        let registry = self.registry.read();
        for table in registry.tables() {
            let pairs: Vec<String> = table
                .iter()
                .map(|(action, chord)| format!("{}={}", action, chord))
                .collect();
            logging::print_line(
                EngineKind::Hotkeys,
                &format!("{}: {}", table.group(), pairs.join(", ")),
            );
        }
    }

    /// Write page params, markers and bindings back to the config file
    fn persist(&mut self) {
        self.recorder.store_into(&mut self.config.recorder);
        self.clicker.store_into(&mut self.config.clicker);
        self.registry.read().store_into(&mut self.config);
        if let Err(e) = self.store.save(&self.config) {
            tracing::warn!(error = %e, path = %self.store.path().display(), "could not save config");
            logging::print_line(EngineKind::Hotkeys, &format!("config not saved: {}", e.message));
        }
    }

    fn report(&self, source: EngineKind, err: &Error) {
        tracing::debug!(%source, code = ?err.code, "operation rejected");
        logging::print_line(source, &err.message);
        for s in &err.suggestions {
            logging::print_line(source, &format!("hint: {}", s));
        }
    }

    /// Handle for reporting into the foreground log
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Foreground loop. Returns on `quit`, or when `interrupt` fires.
    pub fn run(&mut self, commands: Receiver<Command>, interrupt: Receiver<()>) {
        let events = self.events.clone();
        let mut commands = Some(commands);
        loop {
            let command_rx = commands.clone().unwrap_or_else(never);
            select! {
                recv(events) -> msg => {
                    if let Ok(event) = msg {
                        self.handle_event(event);
                    }
                }
                recv(command_rx) -> msg => match msg {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => self.handle_command(cmd),
                    // stdin closed; hotkeys keep working
                    Err(_) => commands = None,
                },
                recv(interrupt) -> _ => {
                    logging::print_line(EngineKind::Hotkeys, "interrupted");
                    break;
                }
            }
        }
        self.shutdown();
    }

    /// Drain whatever is queued right now; used where no loop is running
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Log { source, message } => logging::print_line(source, &message),
            AppEvent::Ended { source, .. } => self.recorder.on_ended(source),
            AppEvent::CaptureStarted { .. } | AppEvent::CaptureFinished { .. } => {}
            AppEvent::BindingsChanged { group } => {
                tracing::debug!(%group, "bindings changed");
                self.persist();
                self.print_bindings();
            }
            AppEvent::Hotkey { group, action } => self.dispatch(&group, &action),
        }
    }

    fn dispatch(&mut self, group: &str, action: &str) {
        let (source, result) = match (group, action) {
            (RECORDER, TOGGLE_RECORD) => (EngineKind::Recorder, self.recorder.toggle_record()),
            (RECORDER, TOGGLE_PLAY) => (EngineKind::Playback, self.recorder.toggle_play()),
            (CLICKER, START_STOP) => (EngineKind::ClickLoop, self.clicker.toggle_start()),
            (CLICKER, ADD_MARKER) => {
                self.clicker.add_marker();
                (EngineKind::ClickLoop, Ok(()))
            }
            _ => {
                tracing::warn!(%group, %action, "hotkey without a handler");
                return;
            }
        };
        if let Err(e) = result {
            self.report(source, &e);
        }
    }

    pub fn handle_command(&mut self, cmd: Command) {
        let (source, result) = match cmd {
            Command::ToggleRecord => (EngineKind::Recorder, self.recorder.toggle_record()),
            Command::TogglePlay => (EngineKind::Playback, self.recorder.toggle_play()),
            Command::ToggleClick => (EngineKind::ClickLoop, self.clicker.toggle_start()),
            Command::AddMarker => {
                self.clicker.add_marker();
                (EngineKind::ClickLoop, Ok(()))
            }
            Command::RemoveMarker { number } => (EngineKind::ClickLoop, self.clicker.remove(number)),
            Command::MoveMarker { number, to } => (EngineKind::ClickLoop, self.clicker.move_marker(number, to)),
            Command::ClearMarkers => {
                self.clicker.clear();
                (EngineKind::ClickLoop, Ok(()))
            }
            Command::Nudge { numbers, dx, dy } => (
                EngineKind::ClickLoop,
                self.clicker.nudge(&numbers, dx, dy).map(|_| ()),
            ),
            Command::SetMarker { number, button, interval } => (
                EngineKind::ClickLoop,
                self.clicker.set_marker(number, button.as_deref(), interval),
            ),
            Command::ListMarkers => {
                self.clicker.list();
                (EngineKind::ClickLoop, Ok(()))
            }
            Command::Bind { group, action } => (EngineKind::Capture, self.capture.begin(&group, &action)),
            Command::CancelBind => {
                if !self.capture.cancel() {
                    logging::print_line(EngineKind::Capture, "no capture in progress");
                }
                (EngineKind::Capture, Ok(()))
            }
            Command::SaveRecording { path } => (EngineKind::Recorder, self.recorder.save(&path)),
            Command::LoadRecording { path } => (EngineKind::Recorder, self.recorder.load(&path)),
            Command::SaveProfile { path } => {
                let hotkeys = self
                    .registry
                    .read()
                    .table(CLICKER)
                    .map(|t| t.to_map())
                    .unwrap_or_default();
                (EngineKind::ClickLoop, self.clicker.save_profile(&path, hotkeys))
            }
            Command::LoadProfile { path } => (EngineKind::ClickLoop, self.load_profile(&path)),
            Command::ResetConfig => (EngineKind::Hotkeys, self.reset_config()),
            Command::Quit => return,
        };
        if let Err(e) = result {
            self.report(source, &e);
        }
    }

    fn load_profile(&mut self, path: &std::path::Path) -> Result<()> {
        if self.capture.is_capturing() {
            return Err(Error::busy("Hotkey capture"));
        }
        if let Some(hotkeys) = self.clicker.load_profile(path)? {
            self.registry.read().store_into(&mut self.config);
            self.config.clicker.hotkeys = hotkeys;
            self.reload_bindings();
        }
        self.persist();
        Ok(())
    }

    fn reset_config(&mut self) -> Result<()> {
        if self.capture.is_capturing() {
            return Err(Error::busy("Hotkey capture"));
        }
        self.recorder.stop_all();
        self.clicker.stop_all();
        self.config = AppConfig::default();
        self.recorder.params = self.config.recorder.params;
        self.recorder.last_file = None;
        self.clicker.reset(&self.config.clicker);
        self.reload_bindings();
        self.persist();
        self.notifier.log(EngineKind::Hotkeys, "configuration reset to defaults");
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.capture.cancel();
        self.dispatcher.shutdown();
        self.recorder.stop_all();
        self.clicker.stop_all();
        self.persist();
        self.pump();
        tracing::debug!("foreground stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_core::platform::{ChannelSource, InjectedAction, InputEvent, RecordingSink};
    use std::thread;
    use std::time::{Duration, Instant};

    struct Rig {
        _dir: tempfile::TempDir,
        path: std::path::PathBuf,
        source: Arc<ChannelSource>,
        sink: Arc<RecordingSink>,
    }

    fn rig() -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_config.json");
        Rig {
            _dir: dir,
            path,
            source: Arc::new(ChannelSource::new()),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    fn app(r: &Rig) -> App {
        App::new(ConfigStore::new(&r.path), r.source.clone(), r.sink.clone())
    }

    /// Pump until `cond` holds or two seconds pass
    fn pump_until(app: &mut App, cond: impl Fn(&App) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            app.pump();
            if cond(app) {
                return true;
            }
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn hotkey_starts_the_click_loop() {
        let r = rig();
        let mut app = app(&r);
        app.handle_command(Command::AddMarker);

        r.source.emit(InputEvent::KeyPressed(Key::Function(7)));
        assert!(pump_until(&mut app, |_| r.sink.len() >= 2));
        assert_eq!(
            &r.sink.actions()[..2],
            &[InjectedAction::MoveTo { x: 100, y: 100 }, InjectedAction::Click(MouseButton::Left)]
        );
        app.shutdown();
    }

    #[test]
    fn rebinding_is_persisted() {
        let r = rig();
        let mut app = app(&r);
        app.handle_command(Command::Bind { group: CLICKER.into(), action: ADD_MARKER.into() });
        r.source.emit(InputEvent::KeyPressed(Key::Modifier(Modifier::Alt)));
        r.source.emit(InputEvent::KeyPressed(Key::Char('m')));
        assert!(pump_until(&mut app, |a| a.config.clicker.hotkeys.get(ADD_MARKER).map(String::as_str) == Some("alt+m")));
        app.shutdown();

        let saved = ConfigStore::new(&r.path).load_strict().unwrap();
        assert_eq!(saved.clicker.hotkeys[ADD_MARKER], "alt+m");
    }

    #[test]
    fn duplicate_bindings_are_repaired_on_start() {
        let r = rig();
        let mut cfg = AppConfig::default();
        cfg.recorder.hotkeys.insert(TOGGLE_PLAY.into(), "f7".into());
        ConfigStore::new(&r.path).save(&cfg).unwrap();

        let mut app = app(&r);
        let saved = ConfigStore::new(&r.path).load_strict().unwrap();
        assert_eq!(saved.clicker.hotkeys[START_STOP], "f7");
        assert_ne!(saved.recorder.hotkeys[TOGGLE_PLAY], "f7");
        app.shutdown();
    }

    #[test]
    fn reset_restores_defaults() {
        let r = rig();
        let mut app = app(&r);
        app.handle_command(Command::AddMarker);
        app.recorder.params.speed = 3.0;
        app.handle_command(Command::ResetConfig);
        assert!(app.clicker.markers().is_empty());
        assert_eq!(app.recorder.params.speed, 1.0);
        app.shutdown();
        assert_eq!(ConfigStore::new(&r.path).load_strict().unwrap(), AppConfig::default());
    }
}
