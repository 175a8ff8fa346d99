//! Click-loop markers
//!
//! A marker keeps a stable [`MarkerId`] for its whole life. The number shown to
//! the user (1-based) is its current position in the list and is derived on
//! demand, so deleting or reordering never renumbers stored ids.

use crate::events::MouseButton;
use crate::run::clamp_secs;
use serde::{Deserialize, Serialize};

pub const MIN_WAIT_SECS: f64 = 0.01;
pub const MAX_WAIT_SECS: f64 = 5.0;
pub const DEFAULT_WAIT_SECS: f64 = 0.2;

/// Clamp a post-click wait into `[0.01, 5.0]` seconds
pub fn clamp_wait(secs: f64) -> f64 {
    clamp_secs(secs, MIN_WAIT_SECS, MAX_WAIT_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    id: MarkerId,
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    wait: f64,
}

impl Marker {
    pub fn id(&self) -> MarkerId {
        self.id
    }

    /// Post-click wait in seconds, always within bounds
    pub fn wait(&self) -> f64 {
        self.wait
    }

    pub fn set_wait(&mut self, secs: f64) -> f64 {
        self.wait = clamp_wait(secs);
        self.wait
    }
}

/// Persisted form of a marker: `id` is the 1-based position at save time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    #[serde(default)]
    pub id: usize,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default = "default_interval")]
    pub interval: f64,
}

fn default_interval() -> f64 {
    DEFAULT_WAIT_SECS
}

#[derive(Debug, Clone, Default)]
pub struct MarkerList {
    markers: Vec<Marker>,
    next_id: u64,
}

impl MarkerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: i32, y: i32) -> MarkerId {
        self.add_with(x, y, MouseButton::Left, DEFAULT_WAIT_SECS)
    }

    pub fn add_with(&mut self, x: i32, y: i32, button: MouseButton, wait: f64) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.push(Marker {
            id,
            x,
            y,
            button,
            wait: clamp_wait(wait),
        });
        id
    }

    pub fn remove(&mut self, id: MarkerId) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        self.markers.len() != before
    }

    pub fn remove_many(&mut self, ids: &[MarkerId]) -> usize {
        let before = self.markers.len();
        self.markers.retain(|m| !ids.contains(&m.id));
        before - self.markers.len()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.markers.iter_mut().find(|m| m.id == id)
    }

    pub fn move_to(&mut self, id: MarkerId, x: i32, y: i32) -> bool {
        match self.get_mut(id) {
            Some(m) => {
                m.x = x;
                m.y = y;
                true
            }
            None => false,
        }
    }

    /// Shift every listed marker by (dx, dy); returns how many moved
    pub fn nudge(&mut self, ids: &[MarkerId], dx: i32, dy: i32) -> usize {
        let mut moved = 0;
        for m in self.markers.iter_mut().filter(|m| ids.contains(&m.id)) {
            m.x = m.x.saturating_add(dx);
            m.y = m.y.saturating_add(dy);
            moved += 1;
        }
        moved
    }

    pub fn set_button(&mut self, id: MarkerId, button: MouseButton) -> bool {
        match self.get_mut(id) {
            Some(m) => {
                m.button = button;
                true
            }
            None => false,
        }
    }

    /// Returns the stored (clamped) wait
    pub fn set_wait(&mut self, id: MarkerId, secs: f64) -> Option<f64> {
        self.get_mut(id).map(|m| m.set_wait(secs))
    }

    /// Move a marker to a 1-based position, clamped to the list bounds
    pub fn reorder(&mut self, id: MarkerId, position: usize) -> bool {
        let Some(from) = self.markers.iter().position(|m| m.id == id) else {
            return false;
        };
        let marker = self.markers.remove(from);
        let to = position.saturating_sub(1).min(self.markers.len());
        self.markers.insert(to, marker);
        true
    }

    /// 1-based display number
    pub fn position(&self, id: MarkerId) -> Option<usize> {
        self.markers.iter().position(|m| m.id == id).map(|i| i + 1)
    }

    pub fn id_at(&self, number: usize) -> Option<MarkerId> {
        number
            .checked_sub(1)
            .and_then(|i| self.markers.get(i))
            .map(|m| m.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Copy handed to a running click loop
    pub fn snapshot(&self) -> Vec<Marker> {
        self.markers.clone()
    }

    pub fn to_records(&self) -> Vec<MarkerRecord> {
        self.markers
            .iter()
            .enumerate()
            .map(|(i, m)| MarkerRecord {
                id: i + 1,
                x: m.x,
                y: m.y,
                button: m.button,
                interval: m.wait,
            })
            .collect()
    }

    /// Stored ids are ignored; order of the records is kept
    pub fn from_records(records: &[MarkerRecord]) -> Self {
        let mut list = Self::new();
        for r in records {
            list.add_with(r.x, r.y, r.button, r.interval);
        }
        list
    }
}
