//! Recorded input events
//!
//! Events serialize to flat JSON objects keyed by `t, type, x, y, dx, dy,
//! button, key`, and a recording is just the JSON array of its events.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    #[serde(alias = "Button.left")]
    Left,
    #[serde(alias = "Button.right")]
    Right,
    #[serde(alias = "Button.middle")]
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        let s = s.strip_prefix("button.").unwrap_or(&s);
        match s {
            "left" | "l" => Some(MouseButton::Left),
            "right" | "r" => Some(MouseButton::Right),
            "middle" | "m" => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Single event - flat structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since recording start
    pub t: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(t: f64, kind: EventKind) -> Self {
        Self { t, kind }
    }
}

/// Event data - one variant per device notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "mouse_move")]
    PointerMove { x: i32, y: i32 },

    #[serde(rename = "mouse_down")]
    ButtonDown { x: i32, y: i32, button: MouseButton },

    #[serde(rename = "mouse_up")]
    ButtonUp { x: i32, y: i32, button: MouseButton },

    #[serde(rename = "mouse_scroll")]
    Scroll { x: i32, y: i32, dx: i32, dy: i32 },

    /// Key token, see [`crate::keys::Key::token`]
    #[serde(rename = "key_down")]
    KeyDown { key: String },

    #[serde(rename = "key_up")]
    KeyUp { key: String },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PointerMove { .. } => "mouse_move",
            EventKind::ButtonDown { .. } => "mouse_down",
            EventKind::ButtonUp { .. } => "mouse_up",
            EventKind::Scroll { .. } => "mouse_scroll",
            EventKind::KeyDown { .. } => "key_down",
            EventKind::KeyUp { .. } => "key_up",
        }
    }
}

/// Ordered, time-stamped capture. Stamps never decrease.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Event>", into = "Vec<Event>")]
pub struct Recording {
    events: Vec<Event>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates stamps; a stamp earlier than its predecessor is raised to it
    pub fn from_events(events: Vec<Event>) -> Result<Self, Error> {
        let mut recording = Self {
            events: Vec::with_capacity(events.len()),
        };
        for (i, e) in events.into_iter().enumerate() {
            if !e.t.is_finite() || e.t < 0.0 {
                return Err(Error::malformed(
                    "recording",
                    format!("event {} has invalid timestamp {}", i, e.t),
                ));
            }
            recording.push(e);
        }
        Ok(recording)
    }

    pub fn push(&mut self, mut event: Event) {
        let last = self.duration();
        if event.t < last {
            event.t = last;
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Stamp of the last event
    pub fn duration(&self) -> f64 {
        self.events.last().map(|e| e.t).unwrap_or(0.0)
    }

    /// Immutable copy handed to a playback task
    pub fn snapshot(&self) -> Arc<[Event]> {
        Arc::from(self.events.as_slice())
    }
}

impl TryFrom<Vec<Event>> for Recording {
    type Error = Error;

    fn try_from(events: Vec<Event>) -> Result<Self, Self::Error> {
        Self::from_events(events)
    }
}

impl From<Recording> for Vec<Event> {
    fn from(r: Recording) -> Self {
        r.events
    }
}
