//! Chords and the normalizer that derives them from raw key events
//!
//! Text form is `ctrl+alt+shift+cmd+<key>` using any subset of the
//! modifiers, always in that order. The key is a lower-case printable
//! character or `f1`..`f24`.

use autoclick_core::platform::InputEvent;
use autoclick_core::{Error, Key, Modifier, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChordKey {
    Char(char),
    Function(u8),
}

impl ChordKey {
    /// Only printable characters and function keys can end a chord
    pub fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Char(c) if !c.is_whitespace() && !c.is_control() && *c != '+' => {
                Some(ChordKey::Char(lower(*c)))
            }
            Key::Function(n) if (1..=24).contains(n) => Some(ChordKey::Function(*n)),
            _ => None,
        }
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordKey::Char(c) => write!(f, "{}", c),
            ChordKey::Function(n) => write!(f, "f{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chord {
    modifiers: BTreeSet<Modifier>,
    key: ChordKey,
}

impl Chord {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: ChordKey) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key,
        }
    }

    pub fn function(n: u8) -> Self {
        Self::new([], ChordKey::Function(n))
    }

    pub fn modifiers(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.modifiers.iter().copied()
    }

    pub fn key(&self) -> ChordKey {
        self.key
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // BTreeSet iterates in declaration order: ctrl, alt, shift, cmd
        for m in &self.modifiers {
            write!(f, "{}+", m)?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for Chord {
    type Err = Error;

    /// Also accepts the bracketed legacy form, e.g. `<ctrl>+<f9>`
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Err(Error::malformed("chord", "empty"));
        }
        let mut modifiers = BTreeSet::new();
        let mut key = None;
        for raw in text.split('+') {
            let part = raw.trim();
            let part = part
                .strip_prefix('<')
                .and_then(|p| p.strip_suffix('>'))
                .unwrap_or(part);
            if part.is_empty() {
                return Err(Error::malformed("chord", format!("'{}' has an empty part", s)));
            }
            if let Some(m) = Modifier::parse(part) {
                if !modifiers.insert(m) {
                    return Err(Error::malformed("chord", format!("'{}' repeats {}", s, m)));
                }
                continue;
            }
            let parsed = Key::from_token(part)
                .as_ref()
                .and_then(ChordKey::from_key)
                .ok_or_else(|| Error::malformed("chord", format!("'{}' has unknown key '{}'", s, part)))?;
            if key.replace(parsed).is_some() {
                return Err(Error::malformed("chord", format!("'{}' has more than one key", s)));
            }
        }
        let key = key.ok_or_else(|| Error::malformed("chord", format!("'{}' has no key", s)))?;
        Ok(Self { modifiers, key })
    }
}

impl TryFrom<String> for Chord {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Chord> for String {
    fn from(c: Chord) -> Self {
        c.to_string()
    }
}

/// What a key press resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Chord(Chord),
    /// Esc never forms a chord
    Escape,
}

/// Tracks held modifiers and turns each non-modifier press into a chord
#[derive(Debug, Default)]
pub struct ChordNormalizer {
    held: BTreeSet<Modifier>,
}

impl ChordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with modifiers that were already down before listening began
    pub fn with_held(held: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            held: held.into_iter().collect(),
        }
    }

    pub fn feed(&mut self, event: &InputEvent) -> Option<Normalized> {
        match event {
            InputEvent::KeyPressed(Key::Modifier(m)) => {
                self.held.insert(*m);
                None
            }
            InputEvent::KeyReleased(Key::Modifier(m)) => {
                self.held.remove(m);
                None
            }
            InputEvent::KeyPressed(Key::Escape) => Some(Normalized::Escape),
            InputEvent::KeyPressed(key) => ChordKey::from_key(key).map(|k| {
                Normalized::Chord(Chord {
                    modifiers: self.held.clone(),
                    key: k,
                })
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(k: Key) -> InputEvent {
        InputEvent::KeyPressed(k)
    }

    #[test]
    fn modifiers_come_first_in_fixed_order() {
        let mut n = ChordNormalizer::new();
        assert_eq!(n.feed(&press(Key::Modifier(Modifier::Ctrl))), None);
        let chord = match n.feed(&press(Key::Char('a'))) {
            Some(Normalized::Chord(c)) => c,
            other => panic!("expected chord, got {:?}", other),
        };
        assert_eq!(chord.to_string(), "ctrl+a");

        let mut n = ChordNormalizer::new();
        n.feed(&press(Key::Modifier(Modifier::Cmd)));
        n.feed(&press(Key::Modifier(Modifier::Shift)));
        n.feed(&press(Key::Modifier(Modifier::Ctrl)));
        assert_eq!(
            n.feed(&press(Key::Char('K'))),
            Some(Normalized::Chord("ctrl+shift+cmd+k".parse().unwrap()))
        );
    }

    #[test]
    fn released_modifiers_drop_out() {
        let mut n = ChordNormalizer::new();
        n.feed(&press(Key::Modifier(Modifier::Alt)));
        n.feed(&InputEvent::KeyReleased(Key::Modifier(Modifier::Alt)));
        assert_eq!(
            n.feed(&press(Key::Function(9))),
            Some(Normalized::Chord(Chord::function(9)))
        );
    }

    #[test]
    fn seeded_modifiers_apply_to_the_next_key() {
        let mut n = ChordNormalizer::with_held([Modifier::Alt]);
        assert_eq!(n.feed(&press(Key::Char('x'))), Some(Normalized::Chord("alt+x".parse().unwrap())));
        n.feed(&InputEvent::KeyReleased(Key::Modifier(Modifier::Alt)));
        assert_eq!(n.feed(&press(Key::Char('x'))), Some(Normalized::Chord("x".parse().unwrap())));
    }

    #[test]
    fn escape_and_untokenized_keys() {
        let mut n = ChordNormalizer::new();
        assert_eq!(n.feed(&press(Key::Escape)), Some(Normalized::Escape));
        assert_eq!(n.feed(&press(Key::Named("space".into()))), None);
        assert_eq!(n.feed(&InputEvent::PointerMoved { x: 1.0, y: 1.0 }), None);
    }

    #[test]
    fn parse_normalizes_order_and_legacy_brackets() {
        let c: Chord = "shift+ctrl+F5".parse().unwrap();
        assert_eq!(c.to_string(), "ctrl+shift+f5");
        let legacy: Chord = "<ctrl>+<f9>".parse().unwrap();
        assert_eq!(legacy.to_string(), "ctrl+f9");
        assert_eq!("<f10>".parse::<Chord>().unwrap(), Chord::function(10));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "ctrl+", "ctrl++a", "ctrl+ctrl+a", "ctrl", "a+b", "hyper+a", "f25", "ctrl+alt+r>"] {
            assert!(bad.parse::<Chord>().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn serde_uses_text_form() {
        let c: Chord = serde_json::from_str("\"alt+x\"").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"alt+x\"");
    }
}
