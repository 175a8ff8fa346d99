//! The two automation pages: record/replay and marker click loop

use autoclick_core::config::{ClickerSection, RecorderSection};
use autoclick_core::platform::{InputSink, InputSource, PointerTracker};
use autoclick_core::prelude::*;
use autoclick_core::storage::{self, ClickProfile};
use autoclick_core::{ClickParams, HotkeyMap, PlaybackParams};
use autoclick_recorder::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a marker lands when the pointer position is unknown
pub const FALLBACK_MARKER_POS: (i32, i32) = (100, 100);

/// Recording and playback share one page; only one of them runs at a time
pub struct RecorderPage {
    recorder: Recorder,
    player: Player,
    pub params: PlaybackParams,
    pub last_file: Option<PathBuf>,
    notifier: Notifier,
}

impl RecorderPage {
    pub fn new(
        source: Arc<dyn InputSource>,
        sink: Arc<dyn InputSink>,
        section: &RecorderSection,
        notifier: Notifier,
    ) -> Self {
        Self {
            recorder: Recorder::new(source, notifier.clone()),
            player: Player::new(sink, notifier.clone()),
            params: section.params,
            last_file: section.last_file.clone(),
            notifier,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_running()
    }

    pub fn event_count(&self) -> usize {
        self.recorder.len()
    }

    pub fn toggle_record(&mut self) -> Result<()> {
        if self.player.is_running() {
            self.notifier
                .log(EngineKind::Recorder, "playback is running, stop it before recording");
            return Ok(());
        }
        if self.recorder.is_recording() {
            self.recorder.stop();
            Ok(())
        } else {
            self.recorder.start(self.params.interval)
        }
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.recorder.is_recording() {
            self.notifier
                .log(EngineKind::Playback, "recording is running, stop it before playback");
            return Ok(());
        }
        if self.player.is_running() {
            self.player.stop();
            return Ok(());
        }
        let p = self.params;
        let replayer = Replayer::new()
            .speed(p.speed)
            .loops(p.loops)
            .gap(p.gap)
            .delay(p.delay);
        self.player.start(&self.recorder.recording(), replayer)
    }

    pub fn on_ended(&mut self, source: EngineKind) {
        if source == EngineKind::Playback {
            self.notifier.log(EngineKind::Recorder, "ready to record");
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let recording = self.recorder.recording();
        if recording.is_empty() {
            return Err(Error::no_data("nothing recorded yet"));
        }
        storage::save_recording(path, &recording)?;
        self.last_file = Some(path.to_path_buf());
        self.notifier.log(
            EngineKind::Recorder,
            format!("saved {} events to {}", recording.len(), path.display()),
        );
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        if self.player.is_running() {
            return Err(Error::busy("Playback"));
        }
        let recording = storage::load_recording(path)?;
        self.recorder.replace(recording)?;
        self.last_file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn store_into(&self, section: &mut RecorderSection) {
        section.params = self.params;
        section.last_file = self.last_file.clone();
    }

    pub fn stop_all(&mut self) {
        if self.recorder.is_recording() {
            self.recorder.stop();
        }
        if self.player.stop() {
            self.player.join();
        }
    }
}

pub struct ClickerPage {
    runner: ClickRunner,
    markers: MarkerList,
    pub params: ClickParams,
    tracker: Option<PointerTracker>,
    notifier: Notifier,
}

impl ClickerPage {
    /// Without a working input source markers are placed at
    /// [`FALLBACK_MARKER_POS`]
    pub fn new(
        source: &dyn InputSource,
        sink: Arc<dyn InputSink>,
        section: &ClickerSection,
        notifier: Notifier,
    ) -> Self {
        let tracker = match PointerTracker::start(source) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(error = %e, "pointer tracking unavailable");
                None
            }
        };
        Self {
            runner: ClickRunner::new(sink, notifier.clone()),
            markers: MarkerList::from_records(&section.markers),
            params: section.params,
            tracker,
            notifier,
        }
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    pub fn markers(&self) -> &MarkerList {
        &self.markers
    }

    pub fn toggle_start(&mut self) -> Result<()> {
        if self.runner.is_running() {
            self.runner.stop();
            return Ok(());
        }
        let options = ClickOptions {
            loops: self.params.loops,
            start_delay: self.params.delay,
        };
        self.runner.start(self.markers.snapshot(), options)
    }

    /// Add a marker under the pointer
    pub fn add_marker(&mut self) -> MarkerId {
        let (x, y) = self
            .tracker
            .as_ref()
            .and_then(|t| t.position())
            .unwrap_or(FALLBACK_MARKER_POS);
        let id = self.markers.add(x, y);
        self.notifier.log(
            EngineKind::ClickLoop,
            format!("marker #{} added at ({}, {})", self.markers.len(), x, y),
        );
        id
    }

    fn id_at(&self, number: usize) -> Result<MarkerId> {
        self.markers.id_at(number).ok_or_else(|| {
            Error::invalid_argument(
                "marker",
                format!("#{} does not exist ({} placed)", number, self.markers.len()),
            )
        })
    }

    pub fn remove(&mut self, number: usize) -> Result<()> {
        let id = self.id_at(number)?;
        self.markers.remove(id);
        self.notifier
            .log(EngineKind::ClickLoop, format!("marker #{} removed", number));
        Ok(())
    }

    /// Change the click order; marker `number` takes display position `to`
    pub fn move_marker(&mut self, number: usize, to: usize) -> Result<()> {
        let id = self.id_at(number)?;
        if to == 0 || to > self.markers.len() {
            return Err(Error::invalid_argument(
                "position",
                format!("#{} is outside 1..={}", to, self.markers.len()),
            ));
        }
        self.markers.reorder(id, to);
        self.notifier
            .log(EngineKind::ClickLoop, format!("marker #{} moved to #{}", number, to));
        Ok(())
    }

    pub fn clear(&mut self) {
        let n = self.markers.len();
        self.markers.clear();
        self.notifier
            .log(EngineKind::ClickLoop, format!("{} markers cleared", n));
    }

    pub fn nudge(&mut self, numbers: &[usize], dx: i32, dy: i32) -> Result<usize> {
        let ids = numbers
            .iter()
            .map(|n| self.id_at(*n))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.markers.nudge(&ids, dx, dy))
    }

    pub fn set_marker(&mut self, number: usize, button: Option<&str>, interval: Option<f64>) -> Result<()> {
        let id = self.id_at(number)?;
        let button = button
            .map(|b| {
                MouseButton::parse(b)
                    .ok_or_else(|| Error::invalid_argument("button", format!("'{}' is not left, right or middle", b)))
            })
            .transpose()?;
        if let Some(b) = button {
            self.markers.set_button(id, b);
        }
        if let Some(secs) = interval {
            self.markers.set_wait(id, secs);
        }
        Ok(())
    }

    /// One log line per marker
    pub fn list(&self) {
        if self.markers.is_empty() {
            self.notifier.log(EngineKind::ClickLoop, "no markers placed");
            return;
        }
        for (i, m) in self.markers.iter().enumerate() {
            self.notifier.log(
                EngineKind::ClickLoop,
                format!(
                    "#{} ({}) @ ({}, {}) wait {:.2}s",
                    i + 1,
                    m.button.as_str(),
                    m.x,
                    m.y,
                    m.wait()
                ),
            );
        }
    }

    pub fn save_profile(&self, path: &Path, hotkeys: HotkeyMap) -> Result<()> {
        let profile = ClickProfile {
            markers: self.markers.to_records(),
            config: self.params,
            hotkeys: Some(hotkeys),
        };
        storage::save_profile(path, &profile)?;
        self.notifier.log(
            EngineKind::ClickLoop,
            format!("saved {} markers to {}", self.markers.len(), path.display()),
        );
        Ok(())
    }

    /// Replace markers and params; hands back the profile's bindings, if any
    pub fn load_profile(&mut self, path: &Path) -> Result<Option<HotkeyMap>> {
        let profile = storage::load_profile(path)?;
        self.markers = MarkerList::from_records(&profile.markers);
        self.params = profile.config;
        self.notifier.log(
            EngineKind::ClickLoop,
            format!("loaded {} markers from {}", self.markers.len(), path.display()),
        );
        Ok(profile.hotkeys)
    }

    pub fn reset(&mut self, section: &ClickerSection) {
        self.markers = MarkerList::from_records(&section.markers);
        self.params = section.params;
    }

    pub fn store_into(&self, section: &mut ClickerSection) {
        section.params = self.params;
        section.markers = self.markers.to_records();
    }

    pub fn stop_all(&mut self) {
        if self.runner.stop() {
            self.runner.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_core::platform::{ChannelSource, InputEvent, RecordingSink};
    use std::thread;
    use std::time::{Duration, Instant};

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

    fn recorder_page() -> (Arc<ChannelSource>, RecorderPage, autoclick_core::notify::Receiver<AppEvent>) {
        let source = Arc::new(ChannelSource::new());
        let (notifier, rx) = Notifier::channel();
        let page = RecorderPage::new(
            source.clone(),
            Arc::new(RecordingSink::new()),
            &RecorderSection::default(),
            notifier,
        );
        (source, page, rx)
    }

    #[test]
    fn play_is_ignored_while_recording() {
        let (source, mut page, rx) = recorder_page();
        page.toggle_record().unwrap();
        source.emit(InputEvent::KeyPressed(Key::Char('a')));
        page.toggle_play().unwrap();
        assert!(!page.is_playing());
        assert!(rx.try_iter().any(|e| matches!(
            e,
            AppEvent::Log { message, .. } if message.contains("stop it before playback")
        )));
        page.toggle_record().unwrap();
        assert!(!page.is_recording());
    }

    #[test]
    fn record_is_ignored_while_playing() {
        let (source, mut page, _rx) = recorder_page();
        page.toggle_record().unwrap();
        source.emit(InputEvent::PointerMoved { x: 1.0, y: 1.0 });
        assert!(wait_until(|| page.event_count() > 0));
        page.toggle_record().unwrap();

        page.params.delay = 5.0;
        page.toggle_play().unwrap();
        assert!(page.is_playing());
        page.toggle_record().unwrap();
        assert!(!page.is_recording());
        page.toggle_play().unwrap();
        assert!(wait_until(|| !page.is_playing()));
    }

    #[test]
    fn empty_recording_cannot_play_or_save() {
        let (_source, mut page, _rx) = recorder_page();
        assert_eq!(page.toggle_play().unwrap_err().code, ErrorCode::NoData);
        let dir = tempfile::tempdir().unwrap();
        let err = page.save(&dir.path().join("r.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoData);
    }

    #[test]
    fn marker_edits_by_display_number() {
        let source = ChannelSource::new();
        let mut page = ClickerPage::new(
            &source,
            Arc::new(RecordingSink::new()),
            &ClickerSection::default(),
            Notifier::disabled(),
        );
        page.add_marker();
        page.add_marker();
        assert_eq!(page.markers().iter().next().map(|m| (m.x, m.y)), Some(FALLBACK_MARKER_POS));

        page.nudge(&[2], 10, -5).unwrap();
        page.set_marker(2, Some("right"), Some(9.0)).unwrap();
        let second = page.markers().iter().nth(1).unwrap().clone();
        assert_eq!((second.x, second.y, second.button), (110, 95, MouseButton::Right));
        assert_eq!(second.wait(), 5.0);

        page.move_marker(2, 1).unwrap();
        assert_eq!(page.markers().iter().next().map(|m| (m.x, m.y)), Some((110, 95)));
        assert_eq!(page.move_marker(1, 3).unwrap_err().code, ErrorCode::InvalidArgument);
        assert_eq!(page.move_marker(1, 0).unwrap_err().code, ErrorCode::InvalidArgument);
        page.move_marker(1, 2).unwrap();

        assert_eq!(page.remove(3).unwrap_err().code, ErrorCode::InvalidArgument);
        assert_eq!(page.set_marker(1, Some("thumb"), None).unwrap_err().code, ErrorCode::InvalidArgument);
        page.remove(1).unwrap();
        assert_eq!(page.markers().len(), 1);
    }

    #[test]
    fn marker_follows_the_pointer() {
        let source = ChannelSource::new();
        let mut page = ClickerPage::new(
            &source,
            Arc::new(RecordingSink::new()),
            &ClickerSection::default(),
            Notifier::disabled(),
        );
        source.emit(InputEvent::PointerMoved { x: 640.4, y: 360.6 });
        let tracked = || page.tracker.as_ref().and_then(|t| t.position()).is_some();
        assert!(wait_until(tracked));
        page.add_marker();
        let m = page.markers().iter().next().unwrap();
        assert_eq!((m.x, m.y), (640, 361));
    }

    #[test]
    fn profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let source = ChannelSource::new();
        let sink: Arc<dyn InputSink> = Arc::new(RecordingSink::new());

        let mut page = ClickerPage::new(&source, sink.clone(), &ClickerSection::default(), Notifier::disabled());
        page.add_marker();
        page.params.loops = LoopCount::Infinite;
        let mut keys = HotkeyMap::new();
        keys.insert("start_stop".into(), "ctrl+s".into());
        page.save_profile(&path, keys.clone()).unwrap();

        let mut other = ClickerPage::new(&source, sink, &ClickerSection::default(), Notifier::disabled());
        let loaded = other.load_profile(&path).unwrap();
        assert_eq!(loaded, Some(keys));
        assert_eq!(other.params.loops, LoopCount::Infinite);
        assert_eq!(other.markers().len(), 1);
    }
}
