//! Background → foreground notifications
//!
//! Engine tasks never touch foreground state. They post [`AppEvent`]s on a
//! channel and a single foreground loop consumes them in order.

use crate::run::{EngineKind, RunOutcome};
pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::unbounded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Committed { chord: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A user-visible log line
    Log { source: EngineKind, message: String },
    /// A recorder/playback/click-loop run is over. Sent exactly once per run.
    Ended { source: EngineKind, outcome: RunOutcome },
    CaptureStarted { group: String, action: String },
    CaptureFinished {
        group: String,
        action: String,
        outcome: CaptureOutcome,
    },
    /// A group's binding table changed; its display and the dispatcher need a refresh
    BindingsChanged { group: String },
    /// A global hotkey fired
    Hotkey { group: String, action: String },
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<Sender<AppEvent>>,
}

impl Notifier {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Notifier plus the receiving end for the foreground loop
    pub fn channel() -> (Self, Receiver<AppEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    /// Drops every notification
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: AppEvent) {
        if let Some(tx) = &self.tx {
            // Foreground gone means nobody is listening anymore
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, source: EngineKind, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%source, "{}", message);
        self.send(AppEvent::Log { source, message });
    }

    pub fn ended(&self, source: EngineKind, outcome: RunOutcome) {
        tracing::debug!(%source, ?outcome, "run ended");
        self.send(AppEvent::Ended { source, outcome });
    }
}
