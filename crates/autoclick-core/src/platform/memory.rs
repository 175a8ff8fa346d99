//! In-process input backends for tests and dry runs

use super::{Broadcast, InputEvent, InputSink, InputSource, InputSubscription, PlatformResult};
use crate::events::MouseButton;
use crate::keys::Key;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Input source fed by hand
#[derive(Clone, Default)]
pub struct ChannelSource {
    hub: Broadcast,
}

impl ChannelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: InputEvent) {
        self.hub.emit(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

impl InputSource for ChannelSource {
    fn subscribe(&self) -> crate::Result<InputSubscription> {
        Ok(self.hub.subscribe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectedAction {
    MoveTo { x: i32, y: i32 },
    Click(MouseButton),
    Press(MouseButton),
    Release(MouseButton),
    KeyDown(Key),
    KeyUp(Key),
    Scroll { dx: i32, dy: i32 },
}

impl std::fmt::Display for InjectedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InjectedAction::MoveTo { x, y } => write!(f, "move to ({}, {})", x, y),
            InjectedAction::Click(b) => write!(f, "click {}", b.as_str()),
            InjectedAction::Press(b) => write!(f, "press {}", b.as_str()),
            InjectedAction::Release(b) => write!(f, "release {}", b.as_str()),
            InjectedAction::KeyDown(k) => write!(f, "key down {}", k),
            InjectedAction::KeyUp(k) => write!(f, "key up {}", k),
            InjectedAction::Scroll { dx, dy } => write!(f, "scroll ({}, {})", dx, dy),
        }
    }
}

/// Sink that records what would have been injected, with timestamps
/// relative to its creation
#[derive(Clone)]
pub struct RecordingSink {
    started: Instant,
    log: Arc<Mutex<Vec<(Duration, InjectedAction)>>>,
    echo: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            log: Arc::new(Mutex::new(Vec::new())),
            echo: false,
        }
    }

    /// Also print every action to stdout (`play --dry-run`)
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    pub fn actions(&self) -> Vec<InjectedAction> {
        self.log.lock().iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn timeline(&self) -> Vec<(Duration, InjectedAction)> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    fn push(&self, action: InjectedAction) -> PlatformResult<()> {
        let at = self.started.elapsed();
        if self.echo {
            println!("{:>9.3}s  {}", at.as_secs_f64(), action);
        }
        self.log.lock().push((at, action));
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn move_to(&self, x: i32, y: i32) -> PlatformResult<()> {
        self.push(InjectedAction::MoveTo { x, y })
    }

    fn press_button(&self, button: MouseButton) -> PlatformResult<()> {
        self.push(InjectedAction::Press(button))
    }

    fn release_button(&self, button: MouseButton) -> PlatformResult<()> {
        self.push(InjectedAction::Release(button))
    }

    fn click(&self, button: MouseButton) -> PlatformResult<()> {
        self.push(InjectedAction::Click(button))
    }

    fn press_key(&self, key: &Key) -> PlatformResult<()> {
        self.push(InjectedAction::KeyDown(key.clone()))
    }

    fn release_key(&self, key: &Key) -> PlatformResult<()> {
        self.push(InjectedAction::KeyUp(key.clone()))
    }

    fn scroll(&self, dx: i32, dy: i32) -> PlatformResult<()> {
        self.push(InjectedAction::Scroll { dx, dy })
    }
}
