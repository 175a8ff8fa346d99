//! Structured errors shared by every engine

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// An engine run or a capture session is already active
    Busy,
    /// Playback or click loop started with nothing to run
    NoData,
    /// Chord already owned by another action
    Conflict,
    /// Global listener could not be (re)installed
    InstallFailure,
    /// Persisted data does not fit the data model
    MalformedInput,
    InvalidArgument,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn busy(what: &str) -> Self {
        Self::new(ErrorCode::Busy, format!("{} is already running", what))
    }

    pub fn no_data(what: &str) -> Self {
        Self::new(ErrorCode::NoData, format!("Nothing to run: {}", what))
    }

    pub fn conflict(chord: &str, group: &str, action: &str) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("Hotkey {} is already used by {}.{}", chord, group, action),
        )
        .with_context(serde_json::json!({
            "chord": chord,
            "group": group,
            "action": action,
        }))
    }

    pub fn install_failure(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InstallFailure,
            format!("Could not install global input listener: {}", reason),
        )
        .with_suggestions(vec![
            "Grant input monitoring / accessibility permission to this process".to_string(),
            "On Linux, make sure an X11 session is available".to_string(),
        ])
    }

    pub fn malformed(what: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::MalformedInput, format!("Malformed {}: {}", what, reason))
    }

    pub fn invalid_argument(name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Invalid {}: {}", name, reason),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::MalformedInput, e.to_string())
    }
}
