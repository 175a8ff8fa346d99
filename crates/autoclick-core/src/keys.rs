//! Physical key model and stable key tokens
//!
//! Tokens are what recordings store in their `key` field: a printable
//! character is stored as itself (`"a"`), every other key as `Key.<name>`
//! (`Key.space`, `Key.f9`, `Key.ctrl_l`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Modifier keys, declared in chord priority order (ctrl < alt < shift < cmd)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Cmd => "cmd",
        }
    }

    /// Accepts common spellings and the left/right variants
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "ctrl_l" | "ctrl_r" | "control" => Some(Modifier::Ctrl),
            "alt" | "alt_l" | "alt_r" | "alt_gr" | "option" => Some(Modifier::Alt),
            "shift" | "shift_l" | "shift_r" => Some(Modifier::Shift),
            "cmd" | "cmd_l" | "cmd_r" | "command" | "super" | "win" | "meta" => {
                Some(Modifier::Cmd)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Modifier(Modifier),
    Escape,
    /// F1..F24
    Function(u8),
    /// Printable, non-whitespace character
    Char(char),
    /// Any other key, by its token name (`space`, `enter`, `left`, ...)
    Named(String),
}

impl Key {
    pub fn token(&self) -> String {
        match self {
            Key::Modifier(m) => format!("Key.{}", m.as_str()),
            Key::Escape => "Key.esc".to_string(),
            Key::Function(n) => format!("Key.f{}", n),
            Key::Char(c) => c.to_string(),
            Key::Named(name) => format!("Key.{}", name),
        }
    }

    pub fn from_token(token: &str) -> Option<Key> {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(match c {
                ' ' => Key::Named("space".to_string()),
                '\t' => Key::Named("tab".to_string()),
                '\n' | '\r' => Key::Named("enter".to_string()),
                c if c.is_control() => return None,
                c => Key::Char(c),
            });
        }

        let name = token.strip_prefix("Key.").unwrap_or(token);
        if name.is_empty() {
            return None;
        }
        if let Some(m) = Modifier::parse(name) {
            return Some(Key::Modifier(m));
        }
        if name == "esc" || name == "escape" {
            return Some(Key::Escape);
        }
        if let Some(n) = parse_function(name) {
            return Some(Key::Function(n));
        }
        Some(Key::Named(name.to_ascii_lowercase()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// `f1`..`f24` (case-insensitive) to its number
pub fn parse_function(name: &str) -> Option<u8> {
    let rest = name.strip_prefix('f').or_else(|| name.strip_prefix('F'))?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match rest.parse::<u8>() {
        Ok(n) if (1..=24).contains(&n) => Some(n),
        _ => None,
    }
}
