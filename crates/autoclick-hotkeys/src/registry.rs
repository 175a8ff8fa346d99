//! Per-group binding tables and the process-wide conflict registry

use crate::chord::{Chord, ChordKey};
use autoclick_core::config::HotkeyMap;
use autoclick_core::{AppConfig, Error, Modifier, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub const RECORDER: &str = "recorder";
pub const CLICKER: &str = "clicker";

pub const TOGGLE_RECORD: &str = "toggle_record";
pub const TOGGLE_PLAY: &str = "toggle_play";
pub const START_STOP: &str = "start_stop";
pub const ADD_MARKER: &str = "add_marker";

/// Registry shared by the capture coordinator, dispatcher and foreground
pub type SharedRegistry = Arc<RwLock<HotkeyRegistry>>;

/// Action -> chord for one group. The action set is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTable {
    group: String,
    actions: Vec<String>,
    chords: BTreeMap<String, Chord>,
}

impl BindingTable {
    pub fn new(group: &str, bindings: &[(&str, Chord)]) -> Self {
        Self {
            group: group.to_string(),
            actions: bindings.iter().map(|(a, _)| a.to_string()).collect(),
            chords: bindings
                .iter()
                .map(|(a, c)| (a.to_string(), c.clone()))
                .collect(),
        }
    }

    pub fn recorder_defaults() -> Self {
        Self::new(
            RECORDER,
            &[(TOGGLE_RECORD, Chord::function(9)), (TOGGLE_PLAY, Chord::function(10))],
        )
    }

    pub fn clicker_defaults() -> Self {
        Self::new(
            CLICKER,
            &[(START_STOP, Chord::function(7)), (ADD_MARKER, Chord::function(6))],
        )
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.chords.contains_key(action)
    }

    pub fn get(&self, action: &str) -> Option<&Chord> {
        self.chords.get(action)
    }

    /// Bindings in the table's fixed action order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Chord)> {
        self.actions
            .iter()
            .filter_map(move |a| self.chords.get(a).map(|c| (a.as_str(), c)))
    }

    fn set(&mut self, action: &str, chord: Chord) -> Result<()> {
        match self.chords.get_mut(action) {
            Some(slot) => {
                *slot = chord;
                Ok(())
            }
            None => Err(unknown_action(&self.group, action)),
        }
    }

    pub fn to_map(&self) -> HotkeyMap {
        self.iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect()
    }

    /// Overlay persisted bindings. Unknown actions and unparsable chords keep
    /// the current value; each one is returned as a warning.
    pub fn apply_map(&mut self, map: &HotkeyMap) -> Vec<String> {
        let mut warnings = Vec::new();
        for (action, text) in map {
            if !self.has_action(action) {
                warnings.push(format!("ignoring unknown action {}.{}", self.group, action));
                continue;
            }
            match text.parse::<Chord>() {
                Ok(chord) => {
                    let _ = self.set(action, chord);
                }
                Err(e) => warnings.push(format!(
                    "{}.{}: {}, keeping {}",
                    self.group,
                    action,
                    e.message,
                    self.chords[action.as_str()]
                )),
            }
        }
        warnings
    }
}

fn unknown_action(group: &str, action: &str) -> Error {
    Error::invalid_argument("action", format!("{}.{} does not exist", group, action))
}

/// A binding changed by [`HotkeyRegistry::repair_duplicates`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repair {
    pub group: String,
    pub action: String,
    pub from: String,
    pub to: String,
}

/// Union of all groups' binding tables. Within one registry a chord is owned
/// by at most one (group, action) once [`HotkeyRegistry::repair_duplicates`]
/// has run and every later change goes through [`HotkeyRegistry::assign`].
#[derive(Debug, Clone, PartialEq)]
pub struct HotkeyRegistry {
    tables: Vec<BindingTable>,
}

impl Default for HotkeyRegistry {
    fn default() -> Self {
        Self::new(vec![
            BindingTable::recorder_defaults(),
            BindingTable::clicker_defaults(),
        ])
    }
}

impl HotkeyRegistry {
    pub fn new(tables: Vec<BindingTable>) -> Self {
        Self { tables }
    }

    /// Defaults overlaid with the config's bindings, then de-duplicated.
    /// Returns the repairs and any parse warnings.
    pub fn from_config(config: &AppConfig) -> (Self, Vec<Repair>, Vec<String>) {
        let mut reg = Self::default();
        let mut warnings = Vec::new();
        for table in &mut reg.tables {
            let map = match table.group.as_str() {
                RECORDER => &config.recorder.hotkeys,
                CLICKER => &config.clicker.hotkeys,
                _ => continue,
            };
            warnings.extend(table.apply_map(map));
        }
        let repairs = reg.repair_duplicates();
        (reg, repairs, warnings)
    }

    /// Write every table back into its config section
    pub fn store_into(&self, config: &mut AppConfig) {
        for table in &self.tables {
            match table.group.as_str() {
                RECORDER => config.recorder.hotkeys = table.to_map(),
                CLICKER => config.clicker.hotkeys = table.to_map(),
                _ => {}
            }
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn tables(&self) -> &[BindingTable] {
        &self.tables
    }

    pub fn table(&self, group: &str) -> Option<&BindingTable> {
        self.tables.iter().find(|t| t.group == group)
    }

    fn table_mut(&mut self, group: &str) -> Option<&mut BindingTable> {
        self.tables.iter_mut().find(|t| t.group == group)
    }

    pub fn contains(&self, group: &str, action: &str) -> bool {
        self.table(group).map(|t| t.has_action(action)).unwrap_or(false)
    }

    /// First (group, action) owning `chord`
    #[cfg(test)]
    fn owner_of(&self, chord: &Chord) -> Option<(&str, &str)> {
        self.tables.iter().find_map(|t| {
            t.iter()
                .find(|(_, c)| *c == chord)
                .map(|(a, _)| (t.group(), a))
        })
    }

    /// True iff any action other than `excluding` owns `chord`
    pub fn is_in_use(&self, chord: &Chord, excluding: (&str, &str)) -> bool {
        self.conflicting_owner(chord, excluding).is_some()
    }

    fn conflicting_owner(&self, chord: &Chord, excluding: (&str, &str)) -> Option<(&str, &str)> {
        self.tables.iter().find_map(|t| {
            t.iter()
                .find(|(a, c)| *c == chord && (t.group(), *a) != excluding)
                .map(|(a, _)| (t.group(), a))
        })
    }

    /// Bind `chord` to (group, action), refusing with `Conflict` when
    /// another action already owns it
    pub fn assign(&mut self, group: &str, action: &str, chord: Chord) -> Result<()> {
        if !self.contains(group, action) {
            return Err(unknown_action(group, action));
        }
        if let Some((g, a)) = self.conflicting_owner(&chord, (group, action)) {
            return Err(Error::conflict(&chord.to_string(), g, a));
        }
        match self.table_mut(group) {
            Some(t) => t.set(action, chord),
            None => Err(unknown_action(group, action)),
        }
    }

    /// Make every chord unique after a load.
    ///
    /// Bindings are visited clicker first (add_marker, start_stop), then
    /// recorder (toggle_record, toggle_play), then any other group. The first
    /// holder of a chord keeps it; a later duplicate takes the first chord that
    /// is neither taken nor held by a binding still to be visited, searching
    /// the group's function-key pool, then `ctrl+alt+a`..`z`, then
    /// `ctrl+alt+shift+a`..`z`.
    pub fn repair_duplicates(&mut self) -> Vec<Repair> {
        let order = self.visit_order();
        let mut used: HashSet<Chord> = HashSet::new();
        let mut repairs = Vec::new();

        for (i, (group, action)) in order.iter().enumerate() {
            let Some(current) = self.table(group).and_then(|t| t.get(action)).cloned() else {
                continue;
            };
            if used.insert(current.clone()) {
                continue;
            }
            let pending: HashSet<Chord> = order[i + 1..]
                .iter()
                .filter_map(|(g, a)| self.table(g).and_then(|t| t.get(a)).cloned())
                .collect();
            let replacement = fallback_pool(group)
                .find(|c| !used.contains(c) && !pending.contains(c));
            let Some(replacement) = replacement else {
                tracing::warn!(%group, %action, chord = %current, "no free chord left, keeping duplicate");
                continue;
            };
            used.insert(replacement.clone());
            if let Some(t) = self.table_mut(group) {
                let _ = t.set(action, replacement.clone());
            }
            tracing::info!(%group, %action, from = %current, to = %replacement, "repaired duplicate hotkey");
            repairs.push(Repair {
                group: group.clone(),
                action: action.clone(),
                from: current.to_string(),
                to: replacement.to_string(),
            });
        }
        repairs
    }

    fn visit_order(&self) -> Vec<(String, String)> {
        let preferred = [
            (CLICKER, ADD_MARKER),
            (CLICKER, START_STOP),
            (RECORDER, TOGGLE_RECORD),
            (RECORDER, TOGGLE_PLAY),
        ];
        let mut order: Vec<(String, String)> = preferred
            .iter()
            .filter(|(g, a)| self.contains(g, a))
            .map(|(g, a)| (g.to_string(), a.to_string()))
            .collect();
        for t in &self.tables {
            for (a, _) in t.iter() {
                let key = (t.group.clone(), a.to_string());
                if !order.contains(&key) {
                    order.push(key);
                }
            }
        }
        order
    }
}

fn function_pool(group: &str) -> &'static [u8] {
    match group {
        RECORDER => &[9, 10, 11, 12, 6, 7, 8],
        _ => &[6, 7, 8, 9, 10, 11, 12],
    }
}

fn fallback_pool(group: &str) -> impl Iterator<Item = Chord> {
    let fkeys = function_pool(group).iter().map(|n| Chord::function(*n));
    let ctrl_alt = ('a'..='z').map(|c| Chord::new([Modifier::Ctrl, Modifier::Alt], ChordKey::Char(c)));
    let ctrl_alt_shift = ('a'..='z').map(|c| {
        Chord::new(
            [Modifier::Ctrl, Modifier::Alt, Modifier::Shift],
            ChordKey::Char(c),
        )
    });
    fkeys.chain(ctrl_alt).chain(ctrl_alt_shift)
}
