//! autoclick-hotkeys - global hotkeys for the automation pages
//!
//! - [`Chord`] and [`ChordNormalizer`] turn raw key events into canonical chords
//! - [`HotkeyRegistry`] keeps one binding table per action group and refuses
//!   chords another action already owns
//! - [`CaptureCoordinator`] runs the single rebinding capture session
//! - [`Dispatcher`] owns the one live chord -> callback mapping

pub mod capture;
pub mod chord;
pub mod dispatcher;
pub mod registry;

pub use capture::CaptureCoordinator;
pub use chord::{Chord, ChordKey, ChordNormalizer, Normalized};
pub use dispatcher::{Dispatcher, HotkeyCallback};
pub use registry::{BindingTable, HotkeyRegistry, Repair, SharedRegistry};

pub mod prelude {
    pub use crate::capture::CaptureCoordinator;
    pub use crate::chord::{Chord, ChordKey};
    pub use crate::dispatcher::Dispatcher;
    pub use crate::registry::{
        BindingTable, HotkeyRegistry, SharedRegistry, ADD_MARKER, CLICKER, RECORDER, START_STOP,
        TOGGLE_PLAY, TOGGLE_RECORD,
    };
}
