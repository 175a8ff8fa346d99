//! autoclick-core - shared model for input automation
//!
//! Holds everything the engines agree on:
//!
//! - the event, recording and marker data model plus its JSON persistence
//! - the key model used by recordings and hotkey chords
//! - cancellation and foreground notification primitives
//! - the platform layer for input injection and listening
//!
//! ## Platform Support
//!
//! Native input goes through rdev (X11 on Linux, CGEventTap on macOS,
//! low-level hooks on Windows). Everything else is platform independent and
//! can be driven by the in-process backends in [`platform`].

pub mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod markers;
pub mod notify;
pub mod platform;
pub mod run;
pub mod storage;

pub use cancel::CancelToken;
pub use config::{AppConfig, ClickParams, ConfigStore, HotkeyMap, PlaybackParams};
pub use error::{Error, ErrorCode, Result};
pub use events::{Event, EventKind, MouseButton, Recording};
pub use keys::{Key, Modifier};
pub use markers::{Marker, MarkerId, MarkerList, MarkerRecord};
pub use notify::{AppEvent, CaptureOutcome, Notifier};
pub use run::{EngineKind, LoopCount, RunOutcome};
pub use storage::{ClickProfile, RecordingStore};

pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::*;
    pub use crate::keys::{Key, Modifier};
    pub use crate::markers::{Marker, MarkerId, MarkerList};
    pub use crate::notify::{AppEvent, Notifier};
    pub use crate::platform::{InputEvent, InputSink, InputSource};
    pub use crate::run::{EngineKind, LoopCount, RunOutcome};
}
