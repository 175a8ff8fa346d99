//! Platform abstraction layer for input
//!
//! Two collaborators sit at the OS boundary:
//! - [`InputSink`] injects pointer/keyboard actions
//! - [`InputSource`] hands out independent listener subscriptions
//!
//! `native` implements both on top of rdev, `memory` provides in-process
//! versions used by tests and dry runs.

mod broadcast;
mod memory;
mod native;
mod tracker;

pub use broadcast::{Broadcast, InputSnapshot, InputSubscription};
pub use memory::{ChannelSource, InjectedAction, RecordingSink};
pub use native::{key_from_rdev, key_to_rdev, RdevSink, RdevSource};
pub use tracker::PointerTracker;

use crate::events::MouseButton;
use crate::keys::Key;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("injection failed: {0}")]
    Simulate(String),
    #[error("unsupported key: {0}")]
    UnknownKey(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Raw device notification, already detached from the backend's types
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f64, y: f64 },
    ButtonPressed(MouseButton),
    ButtonReleased(MouseButton),
    Wheel { dx: i64, dy: i64 },
    KeyPressed(Key),
    KeyReleased(Key),
}

/// Output injection. Calls are synchronous; callers treat failures as best-effort.
pub trait InputSink: Send + Sync {
    fn move_to(&self, x: i32, y: i32) -> PlatformResult<()>;
    fn press_button(&self, button: MouseButton) -> PlatformResult<()>;
    fn release_button(&self, button: MouseButton) -> PlatformResult<()>;
    fn click(&self, button: MouseButton) -> PlatformResult<()>;
    fn press_key(&self, key: &Key) -> PlatformResult<()>;
    fn release_key(&self, key: &Key) -> PlatformResult<()>;
    fn scroll(&self, dx: i32, dy: i32) -> PlatformResult<()>;
}

/// Input listening. Each subscription is an independent listener instance.
pub trait InputSource: Send + Sync {
    fn subscribe(&self) -> crate::Result<InputSubscription>;
}
