//! Run parameters and outcomes shared by the engines

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many times a sequence repeats. Persisted as an integer, `-1` = forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LoopCount {
    Finite(u32),
    Infinite,
}

impl LoopCount {
    pub fn from_i64(n: i64) -> Result<Self> {
        match n {
            -1 => Ok(LoopCount::Infinite),
            n if n >= 0 => u32::try_from(n)
                .map(LoopCount::Finite)
                .map_err(|_| Error::invalid_argument("loops", format!("{} is too large", n))),
            n => Err(Error::invalid_argument(
                "loops",
                format!("{} (use -1 for infinite)", n),
            )),
        }
    }

    /// Whether iteration `completed + 1` should run
    pub fn allows(&self, completed: u64) -> bool {
        match self {
            LoopCount::Finite(n) => completed < u64::from(*n),
            LoopCount::Infinite => true,
        }
    }
}

impl Default for LoopCount {
    fn default() -> Self {
        LoopCount::Finite(1)
    }
}

impl TryFrom<i64> for LoopCount {
    type Error = Error;

    fn try_from(n: i64) -> Result<Self> {
        Self::from_i64(n)
    }
}

impl From<LoopCount> for i64 {
    fn from(l: LoopCount) -> Self {
        match l {
            LoopCount::Finite(n) => i64::from(n),
            LoopCount::Infinite => -1,
        }
    }
}

impl fmt::Display for LoopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopCount::Finite(n) => write!(f, "{}", n),
            LoopCount::Infinite => f.write_str("infinite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Recorder,
    Playback,
    ClickLoop,
    Capture,
    Hotkeys,
    /// Foreground JSONL commands
    Commands,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Recorder => "recorder",
            EngineKind::Playback => "playback",
            EngineKind::ClickLoop => "clicker",
            EngineKind::Capture => "capture",
            EngineKind::Hotkeys => "hotkeys",
            EngineKind::Commands => "commands",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Clamp that also maps NaN to the lower bound
pub fn clamp_secs(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}
