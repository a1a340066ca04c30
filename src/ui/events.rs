use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::sync::Arc;

use crate::browser::Key;
use crate::search::BigramIndex;

/// Results posted to the event loop by background jobs.
#[derive(Debug)]
pub enum AppEvent {
    Previews {
        generation: u64,
        previews: HashMap<String, Vec<String>>,
    },
    IndexReady {
        fingerprint: u64,
        index: Arc<BigramIndex>,
    },
    IndexFailed {
        fingerprint: u64,
    },
}

/// Decode a terminal key press. Keys the browser does not use map to None.
pub fn map_key(key: KeyEvent) -> Option<Key> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match (key.code, ctrl) {
        (KeyCode::Char('w'), true) => Some(Key::DeleteWord),
        (KeyCode::Char('t'), true) | (KeyCode::Tab, _) => Some(Key::SwitchMode),
        // ctrl+\ arrives as ctrl+4 on some terminals
        (KeyCode::Char('c'), true)
        | (KeyCode::Char('\\'), true)
        | (KeyCode::Char('4'), true)
        | (KeyCode::Esc, _) => Some(Key::Cancel),
        (KeyCode::Char('k'), true) | (KeyCode::Up, _) => Some(Key::Up),
        (KeyCode::Char('j'), true) | (KeyCode::Down, _) => Some(Key::Down),
        (KeyCode::PageUp, _) => Some(Key::PageUp),
        (KeyCode::PageDown, _) => Some(Key::PageDown),
        (KeyCode::Enter, _) => Some(Key::Enter),
        (KeyCode::Backspace, _) => Some(Key::Backspace),
        (KeyCode::Char(c), false) if !key.modifiers.contains(KeyModifiers::ALT) => Some(Key::Char(c)),
        _ => None,
    }
}
