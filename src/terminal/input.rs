//! Console input translation.
//!
//! Converts crossterm events into what the console terminal should do with
//! them: forward bytes to the remote shell, report a resize, or detach.
//!
//! ```text
//! crossterm::Event ──► event_to_action() ──► InputAction
//!                                               │
//!                     ConsoleTerminal listeners ◄┘
//! ```

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a console event means for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Text to send to the remote shell.
    Forward(String),
    /// The console was resized.
    Resize {
        /// New width in cells.
        columns: u16,
        /// New height in cells.
        rows: u16,
    },
    /// Leave the session (Ctrl+Q).
    Detach,
}

/// Convert a crossterm event.
///
/// Returns `None` for events with no meaning here (key releases, mouse,
/// focus changes).
#[must_use]
pub fn event_to_action(event: &Event) -> Option<InputAction> {
    match event {
        Event::Key(key) => key_event_to_action(key),
        Event::Paste(text) => Some(InputAction::Forward(text.clone())),
        Event::Resize(columns, rows) => Some(InputAction::Resize {
            columns: *columns,
            rows: *rows,
        }),
        _ => None,
    }
}

/// Convert a key press.
#[must_use]
pub fn key_event_to_action(key: &KeyEvent) -> Option<InputAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('q' | 'Q')) {
        return Some(InputAction::Detach);
    }

    let text = key_text(key.code, ctrl)?;
    if key.modifiers.contains(KeyModifiers::ALT) {
        return Some(InputAction::Forward(format!("\x1b{text}")));
    }
    Some(InputAction::Forward(text))
}

fn key_text(code: KeyCode, ctrl: bool) -> Option<String> {
    let text = match code {
        KeyCode::Char(c) if ctrl => return Some(control_char(c)),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::BackTab => "\x1b[Z".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::PageUp => "\x1b[5~".to_string(),
        KeyCode::PageDown => "\x1b[6~".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        KeyCode::Insert => "\x1b[2~".to_string(),
        KeyCode::F(n) => function_key(n)?.to_string(),
        _ => return None,
    };
    Some(text)
}

/// Ctrl+A = 0x01 ... Ctrl+_ = 0x1f; anything outside that range is sent as-is.
fn control_char(c: char) -> String {
    let upper = c.to_ascii_uppercase();
    if ('@'..='_').contains(&upper) {
        char::from((upper as u8).wrapping_sub(b'@')).to_string()
    } else {
        c.to_string()
    }
}

fn function_key(n: u8) -> Option<&'static str> {
    Some(match n {
        1 => "\x1bOP",
        2 => "\x1bOQ",
        3 => "\x1bOR",
        4 => "\x1bOS",
        5 => "\x1b[15~",
        6 => "\x1b[17~",
        7 => "\x1b[18~",
        8 => "\x1b[19~",
        9 => "\x1b[20~",
        10 => "\x1b[21~",
        11 => "\x1b[23~",
        12 => "\x1b[24~",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn make_key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn make_key_ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    fn forwarded(key: KeyEvent) -> String {
        match key_event_to_action(&key) {
            Some(InputAction::Forward(text)) => text,
            other => panic!("expected Forward, got {other:?}"),
        }
    }

    #[test]
    fn test_ctrl_q_detaches() {
        assert_eq!(
            key_event_to_action(&make_key_ctrl(KeyCode::Char('q'))),
            Some(InputAction::Detach)
        );
    }

    #[test]
    fn test_plain_chars_forward() {
        assert_eq!(forwarded(make_key(KeyCode::Char('q'))), "q");
        assert_eq!(forwarded(make_key(KeyCode::Char('é'))), "é");
    }

    #[test]
    fn test_ctrl_chars_become_control_bytes() {
        assert_eq!(forwarded(make_key_ctrl(KeyCode::Char('c'))), "\x03");
        assert_eq!(forwarded(make_key_ctrl(KeyCode::Char('a'))), "\x01");
        assert_eq!(forwarded(make_key_ctrl(KeyCode::Char('['))), "\x1b");
        assert_eq!(forwarded(make_key_ctrl(KeyCode::Char('1'))), "1");
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(forwarded(make_key(KeyCode::Enter)), "\r");
        assert_eq!(forwarded(make_key(KeyCode::Backspace)), "\x7f");
        assert_eq!(forwarded(make_key(KeyCode::Up)), "\x1b[A");
        assert_eq!(forwarded(make_key(KeyCode::Left)), "\x1b[D");
        assert_eq!(forwarded(make_key(KeyCode::PageDown)), "\x1b[6~");
        assert_eq!(forwarded(make_key(KeyCode::F(5))), "\x1b[15~");
        assert_eq!(key_event_to_action(&make_key(KeyCode::F(20))), None);
    }

    #[test]
    fn test_alt_prefixes_escape() {
        let key = KeyEvent::new(KeyCode::Char('b'), KeyModifiers::ALT);
        assert_eq!(forwarded(key), "\x1bb");
    }

    #[test]
    fn test_key_release_ignored() {
        let key = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(key_event_to_action(&key), None);
    }

    #[test]
    fn test_resize_and_paste_events() {
        assert_eq!(
            event_to_action(&Event::Resize(100, 30)),
            Some(InputAction::Resize {
                columns: 100,
                rows: 30
            })
        );
        assert_eq!(
            event_to_action(&Event::Paste("ls -la".to_string())),
            Some(InputAction::Forward("ls -la".to_string()))
        );
        assert_eq!(event_to_action(&Event::FocusGained), None);
    }
}
