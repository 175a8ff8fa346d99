//! Foreground control over stdin, one JSON command per line
//!
//! ```json
//! {"type": "toggleRecord"}
//! {"type": "addMarker"}
//! {"type": "moveMarker", "number": 3, "to": 1}
//! {"type": "nudge", "numbers": [1, 2], "dx": 0, "dy": -10}
//! {"type": "setMarker", "number": 1, "button": "right", "interval": 0.5}
//! {"type": "bind", "group": "clicker", "action": "start_stop"}
//! {"type": "saveProfile", "path": "clicks.json"}
//! ```

use autoclick_core::{EngineKind, Notifier};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    ToggleRecord,
    TogglePlay,
    ToggleClick,
    AddMarker,
    /// Numbers are 1-based display positions
    RemoveMarker { number: usize },
    /// Change the click order
    MoveMarker { number: usize, to: usize },
    ClearMarkers,
    Nudge {
        numbers: Vec<usize>,
        #[serde(default)]
        dx: i32,
        #[serde(default)]
        dy: i32,
    },
    SetMarker {
        number: usize,
        #[serde(default)]
        button: Option<String>,
        #[serde(default)]
        interval: Option<f64>,
    },
    ListMarkers,
    /// Open a hotkey capture for (group, action)
    Bind { group: String, action: String },
    CancelBind,
    SaveRecording { path: PathBuf },
    LoadRecording { path: PathBuf },
    SaveProfile { path: PathBuf },
    LoadProfile { path: PathBuf },
    ResetConfig,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, serde_json::Error> {
    serde_json::from_str(line)
}

/// Reads stdin on a background thread. The receiver disconnects at EOF.
/// Lines that do not parse are reported through `notifier` and skipped.
pub fn spawn_stdin_reader(notifier: Notifier) -> std::io::Result<Receiver<Command>> {
    let (tx, rx) = bounded(64);
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            read_commands(std::io::stdin().lock(), &tx, &notifier);
            tracing::debug!("stdin closed");
        })?;
    Ok(rx)
}

fn read_commands(input: impl BufRead, tx: &Sender<Command>, notifier: &Notifier) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(cmd) => {
                tracing::debug!(?cmd, "command received");
                if tx.send(cmd).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, %line, "malformed command");
                notifier.log(EngineKind::Commands, format!("ignoring malformed command: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_core::AppEvent;

    #[test]
    fn parses_unit_and_struct_commands() {
        assert_eq!(parse(r#"{"type":"toggleRecord"}"#).unwrap(), Command::ToggleRecord);
        assert_eq!(
            parse(r#"{"type":"nudge","numbers":[1,3],"dy":-10}"#).unwrap(),
            Command::Nudge { numbers: vec![1, 3], dx: 0, dy: -10 }
        );
        assert_eq!(
            parse(r#"{"type":"setMarker","number":2,"interval":0.5}"#).unwrap(),
            Command::SetMarker { number: 2, button: None, interval: Some(0.5) }
        );
        assert_eq!(
            parse(r#"{"type":"moveMarker","number":3,"to":1}"#).unwrap(),
            Command::MoveMarker { number: 3, to: 1 }
        );
        assert_eq!(
            parse(r#"{"type":"loadProfile","path":"p.json"}"#).unwrap(),
            Command::LoadProfile { path: PathBuf::from("p.json") }
        );
    }

    #[test]
    fn malformed_lines_are_logged_and_skipped() {
        let input = "{\"type\":\"addMarker\"}\n\nnot json\n{\"type\":\"explode\"}\n{\"type\":\"quit\"}\n";
        let (tx, rx) = bounded(8);
        let (notifier, events) = Notifier::channel();
        read_commands(input.as_bytes(), &tx, &notifier);

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Command::AddMarker, Command::Quit]);
        let logged: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                AppEvent::Log { source, message } => Some((source, message)),
                _ => None,
            })
            .collect();
        assert_eq!(logged.len(), 2);
        assert!(logged
            .iter()
            .all(|(s, m)| *s == EngineKind::Commands && m.starts_with("ignoring malformed command")));
    }

    #[test]
    fn rejects_unknown_or_incomplete() {
        assert!(parse(r#"{"type":"explode"}"#).is_err());
        assert!(parse(r#"{"type":"removeMarker"}"#).is_err());
        assert!(parse("toggleRecord").is_err());
    }
}
