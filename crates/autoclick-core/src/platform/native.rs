//! rdev-backed input listening and injection

use super::{Broadcast, InputEvent, InputSink, InputSource, InputSubscription, PlatformError, PlatformResult};
use crate::error::{Error, Result};
use crate::events::MouseButton;
use crate::keys::{Key, Modifier};
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use rdev::{Button, EventType};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

/// rdev reports hook failures right away; after this long we assume the hook is live
const LISTEN_STARTUP_GRACE: Duration = Duration::from_millis(250);

/// Pause between press and release of a click
const CLICK_SETTLE: Duration = Duration::from_millis(10);

enum ListenState {
    NotStarted,
    Running,
    Failed(String),
}

/// Process-wide rdev hook. `rdev::listen` never returns while the hook is
/// alive, so a single thread feeds a [`Broadcast`] and every listener in the
/// process is a subscription on it.
pub struct RdevSource {
    hub: Broadcast,
    state: Mutex<ListenState>,
}

impl RdevSource {
    pub fn global() -> &'static RdevSource {
        static SOURCE: OnceLock<RdevSource> = OnceLock::new();
        SOURCE.get_or_init(|| RdevSource {
            hub: Broadcast::new(),
            state: Mutex::new(ListenState::NotStarted),
        })
    }

    /// The process-wide source as a shareable trait object
    pub fn shared() -> Arc<dyn InputSource> {
        Arc::new(Self::global())
    }

    fn ensure_started(&self) -> Result<()> {
        let mut state = self.state.lock();
        match &*state {
            ListenState::Running => return Ok(()),
            ListenState::Failed(reason) => return Err(Error::install_failure(reason)),
            ListenState::NotStarted => {}
        }

        let hub = self.hub.clone();
        let (err_tx, err_rx) = bounded::<String>(1);
        thread::Builder::new()
            .name("rdev-listen".to_string())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if let Some(e) = convert_event(&event.event_type) {
                        hub.emit(e);
                    }
                });
                let reason = match result {
                    Ok(()) => "listener exited".to_string(),
                    Err(e) => format!("{:?}", e),
                };
                tracing::error!(%reason, "global input listener stopped");
                let _ = err_tx.send(reason);
            })
            .map_err(|e| Error::install_failure(e))?;

        match err_rx.recv_timeout(LISTEN_STARTUP_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("global input listener running");
                *state = ListenState::Running;
                Ok(())
            }
            Ok(reason) => {
                *state = ListenState::Failed(reason.clone());
                Err(Error::install_failure(reason))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let reason = "listener thread ended".to_string();
                *state = ListenState::Failed(reason.clone());
                Err(Error::install_failure(reason))
            }
        }
    }
}

impl InputSource for RdevSource {
    fn subscribe(&self) -> Result<InputSubscription> {
        self.ensure_started()?;
        Ok(self.hub.subscribe())
    }
}

impl InputSource for &'static RdevSource {
    fn subscribe(&self) -> Result<InputSubscription> {
        (**self).subscribe()
    }
}

/// Injects through `rdev::simulate`
#[derive(Debug, Default, Clone, Copy)]
pub struct RdevSink;

impl RdevSink {
    pub fn new() -> Self {
        Self
    }
}

fn send(event: &EventType) -> PlatformResult<()> {
    rdev::simulate(event).map_err(|e| PlatformError::Simulate(format!("{:?} ({:?})", event, e)))
}

fn rdev_key(key: &Key) -> PlatformResult<rdev::Key> {
    key_to_rdev(key).ok_or_else(|| PlatformError::UnknownKey(key.token()))
}

impl InputSink for RdevSink {
    fn move_to(&self, x: i32, y: i32) -> PlatformResult<()> {
        send(&EventType::MouseMove {
            x: f64::from(x),
            y: f64::from(y),
        })
    }

    fn press_button(&self, button: MouseButton) -> PlatformResult<()> {
        send(&EventType::ButtonPress(button_to_rdev(button)))
    }

    fn release_button(&self, button: MouseButton) -> PlatformResult<()> {
        send(&EventType::ButtonRelease(button_to_rdev(button)))
    }

    fn click(&self, button: MouseButton) -> PlatformResult<()> {
        self.press_button(button)?;
        thread::sleep(CLICK_SETTLE);
        self.release_button(button)
    }

    fn press_key(&self, key: &Key) -> PlatformResult<()> {
        send(&EventType::KeyPress(rdev_key(key)?))
    }

    fn release_key(&self, key: &Key) -> PlatformResult<()> {
        send(&EventType::KeyRelease(rdev_key(key)?))
    }

    fn scroll(&self, dx: i32, dy: i32) -> PlatformResult<()> {
        send(&EventType::Wheel {
            delta_x: i64::from(dx),
            delta_y: i64::from(dy),
        })
    }
}

fn convert_event(event: &EventType) -> Option<InputEvent> {
    Some(match event {
        EventType::MouseMove { x, y } => InputEvent::PointerMoved { x: *x, y: *y },
        EventType::ButtonPress(b) => InputEvent::ButtonPressed(button_from_rdev(*b)?),
        EventType::ButtonRelease(b) => InputEvent::ButtonReleased(button_from_rdev(*b)?),
        EventType::Wheel { delta_x, delta_y } => InputEvent::Wheel {
            dx: *delta_x,
            dy: *delta_y,
        },
        EventType::KeyPress(k) => InputEvent::KeyPressed(key_from_rdev(*k)),
        EventType::KeyRelease(k) => InputEvent::KeyReleased(key_from_rdev(*k)),
    })
}

fn button_from_rdev(b: Button) -> Option<MouseButton> {
    match b {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        Button::Middle => Some(MouseButton::Middle),
        Button::Unknown(_) => None,
    }
}

fn button_to_rdev(b: MouseButton) -> Button {
    match b {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

// ============================================================================
// Key mapping
// ============================================================================

const CHAR_KEYS: &[(char, rdev::Key)] = &[
    ('a', rdev::Key::KeyA), ('b', rdev::Key::KeyB), ('c', rdev::Key::KeyC),
    ('d', rdev::Key::KeyD), ('e', rdev::Key::KeyE), ('f', rdev::Key::KeyF),
    ('g', rdev::Key::KeyG), ('h', rdev::Key::KeyH), ('i', rdev::Key::KeyI),
    ('j', rdev::Key::KeyJ), ('k', rdev::Key::KeyK), ('l', rdev::Key::KeyL),
    ('m', rdev::Key::KeyM), ('n', rdev::Key::KeyN), ('o', rdev::Key::KeyO),
    ('p', rdev::Key::KeyP), ('q', rdev::Key::KeyQ), ('r', rdev::Key::KeyR),
    ('s', rdev::Key::KeyS), ('t', rdev::Key::KeyT), ('u', rdev::Key::KeyU),
    ('v', rdev::Key::KeyV), ('w', rdev::Key::KeyW), ('x', rdev::Key::KeyX),
    ('y', rdev::Key::KeyY), ('z', rdev::Key::KeyZ),
    ('0', rdev::Key::Num0), ('1', rdev::Key::Num1), ('2', rdev::Key::Num2),
    ('3', rdev::Key::Num3), ('4', rdev::Key::Num4), ('5', rdev::Key::Num5),
    ('6', rdev::Key::Num6), ('7', rdev::Key::Num7), ('8', rdev::Key::Num8),
    ('9', rdev::Key::Num9),
    ('-', rdev::Key::Minus), ('=', rdev::Key::Equal),
    ('[', rdev::Key::LeftBracket), (']', rdev::Key::RightBracket),
    (';', rdev::Key::SemiColon), ('\'', rdev::Key::Quote),
    ('`', rdev::Key::BackQuote), ('\\', rdev::Key::BackSlash),
    (',', rdev::Key::Comma), ('.', rdev::Key::Dot), ('/', rdev::Key::Slash),
];

/// Shifted symbols recorded by older files, mapped to their physical key
const SHIFTED_CHARS: &[(char, char)] = &[
    ('!', '1'), ('@', '2'), ('#', '3'), ('$', '4'), ('%', '5'), ('^', '6'),
    ('&', '7'), ('*', '8'), ('(', '9'), (')', '0'), ('_', '-'), ('+', '='),
    ('{', '['), ('}', ']'), (':', ';'), ('"', '\''), ('~', '`'), ('|', '\\'),
    ('<', ','), ('>', '.'), ('?', '/'),
];

const NAMED_KEYS: &[(&str, rdev::Key)] = &[
    ("space", rdev::Key::Space),
    ("enter", rdev::Key::Return),
    ("tab", rdev::Key::Tab),
    ("backspace", rdev::Key::Backspace),
    ("delete", rdev::Key::Delete),
    ("insert", rdev::Key::Insert),
    ("home", rdev::Key::Home),
    ("end", rdev::Key::End),
    ("page_up", rdev::Key::PageUp),
    ("page_down", rdev::Key::PageDown),
    ("up", rdev::Key::UpArrow),
    ("down", rdev::Key::DownArrow),
    ("left", rdev::Key::LeftArrow),
    ("right", rdev::Key::RightArrow),
    ("caps_lock", rdev::Key::CapsLock),
    ("num_lock", rdev::Key::NumLock),
    ("scroll_lock", rdev::Key::ScrollLock),
    ("print_screen", rdev::Key::PrintScreen),
    ("pause", rdev::Key::Pause),
    ("fn", rdev::Key::Function),
    ("intl_backslash", rdev::Key::IntlBackslash),
    ("kp_enter", rdev::Key::KpReturn),
    ("kp_minus", rdev::Key::KpMinus),
    ("kp_plus", rdev::Key::KpPlus),
    ("kp_multiply", rdev::Key::KpMultiply),
    ("kp_divide", rdev::Key::KpDivide),
    ("kp_delete", rdev::Key::KpDelete),
    ("kp_0", rdev::Key::Kp0), ("kp_1", rdev::Key::Kp1), ("kp_2", rdev::Key::Kp2),
    ("kp_3", rdev::Key::Kp3), ("kp_4", rdev::Key::Kp4), ("kp_5", rdev::Key::Kp5),
    ("kp_6", rdev::Key::Kp6), ("kp_7", rdev::Key::Kp7), ("kp_8", rdev::Key::Kp8),
    ("kp_9", rdev::Key::Kp9),
];

const FUNCTION_KEYS: [rdev::Key; 12] = [
    rdev::Key::F1, rdev::Key::F2, rdev::Key::F3, rdev::Key::F4,
    rdev::Key::F5, rdev::Key::F6, rdev::Key::F7, rdev::Key::F8,
    rdev::Key::F9, rdev::Key::F10, rdev::Key::F11, rdev::Key::F12,
];

pub fn key_from_rdev(key: rdev::Key) -> Key {
    use rdev::Key as K;
    match key {
        K::ControlLeft | K::ControlRight => return Key::Modifier(Modifier::Ctrl),
        K::Alt | K::AltGr => return Key::Modifier(Modifier::Alt),
        K::ShiftLeft | K::ShiftRight => return Key::Modifier(Modifier::Shift),
        K::MetaLeft | K::MetaRight => return Key::Modifier(Modifier::Cmd),
        K::Escape => return Key::Escape,
        K::Unknown(code) => return Key::Named(format!("unknown_{}", code)),
        _ => {}
    }
    if let Some(i) = FUNCTION_KEYS.iter().position(|k| *k == key) {
        return Key::Function(i as u8 + 1);
    }
    if let Some((c, _)) = CHAR_KEYS.iter().find(|(_, k)| *k == key) {
        return Key::Char(*c);
    }
    if let Some((name, _)) = NAMED_KEYS.iter().find(|(_, k)| *k == key) {
        return Key::Named((*name).to_string());
    }
    Key::Named(format!("{:?}", key).to_ascii_lowercase())
}

pub fn key_to_rdev(key: &Key) -> Option<rdev::Key> {
    match key {
        Key::Modifier(Modifier::Ctrl) => Some(rdev::Key::ControlLeft),
        Key::Modifier(Modifier::Alt) => Some(rdev::Key::Alt),
        Key::Modifier(Modifier::Shift) => Some(rdev::Key::ShiftLeft),
        Key::Modifier(Modifier::Cmd) => Some(rdev::Key::MetaLeft),
        Key::Escape => Some(rdev::Key::Escape),
        Key::Function(n) => FUNCTION_KEYS.get(usize::from(*n).checked_sub(1)?).copied(),
        Key::Char(c) => {
            let c = c.to_ascii_lowercase();
            let c = SHIFTED_CHARS
                .iter()
                .find(|(shifted, _)| *shifted == c)
                .map(|(_, base)| *base)
                .unwrap_or(c);
            CHAR_KEYS.iter().find(|(ch, _)| *ch == c).map(|(_, k)| *k)
        }
        Key::Named(name) => {
            if let Some(code) = name.strip_prefix("unknown_").and_then(|s| s.parse().ok()) {
                return Some(rdev::Key::Unknown(code));
            }
            NAMED_KEYS.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_become_chars() {
        assert_eq!(key_from_rdev(rdev::Key::KeyA), Key::Char('a'));
        assert_eq!(key_from_rdev(rdev::Key::Num7), Key::Char('7'));
        assert_eq!(key_from_rdev(rdev::Key::F10), Key::Function(10));
        assert_eq!(key_from_rdev(rdev::Key::ControlRight), Key::Modifier(Modifier::Ctrl));
        assert_eq!(key_from_rdev(rdev::Key::Space), Key::Named("space".into()));
    }

    #[test]
    fn tokens_map_back_to_physical_keys() {
        assert_eq!(key_to_rdev(&Key::Char('A')), Some(rdev::Key::KeyA));
        assert_eq!(key_to_rdev(&Key::Char('!')), Some(rdev::Key::Num1));
        assert_eq!(key_to_rdev(&Key::Function(12)), Some(rdev::Key::F12));
        assert_eq!(key_to_rdev(&Key::Function(13)), None);
        assert_eq!(key_to_rdev(&Key::Function(0)), None);
        assert_eq!(key_to_rdev(&Key::Named("page_down".into())), Some(rdev::Key::PageDown));
        assert_eq!(key_to_rdev(&Key::Named("unknown_77".into())), Some(rdev::Key::Unknown(77)));
        assert_eq!(key_to_rdev(&Key::Named("hyper".into())), None);
    }

    #[test]
    fn unknown_buttons_are_dropped() {
        assert_eq!(convert_event(&EventType::ButtonPress(Button::Unknown(4))), None);
        assert_eq!(
            convert_event(&EventType::ButtonRelease(Button::Right)),
            Some(InputEvent::ButtonReleased(MouseButton::Right))
        );
    }
}
