//! autoclick-recorder - input recording and automated replay
//!
//! Three engines, each with at most one run alive at a time:
//!
//! - [`Recorder`] captures device events with elapsed-time stamps
//! - [`Player`] replays a recording snapshot with speed, loops, gap and delay
//! - [`ClickRunner`] clicks through a marker snapshot in a loop
//!
//! Runs execute on background threads, are cancelled cooperatively, and post
//! their log lines and exactly one end notification through a
//! [`autoclick_core::Notifier`].

pub mod clicker;
pub mod recorder;
pub mod replay;
mod task;

pub use clicker::{ClickOptions, ClickRunner};
pub use recorder::Recorder;
pub use replay::{Player, ReplayStats, Replayer};

pub mod prelude {
    pub use crate::clicker::{ClickOptions, ClickRunner};
    pub use crate::recorder::Recorder;
    pub use crate::replay::{Player, ReplayStats, Replayer};
}
