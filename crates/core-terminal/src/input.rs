//! Input normalization: crossterm events to the dashboard key set.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Normalized dashboard keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// Alt-modified printable (mode switching).
    Alt(char),
    F(u8),
    Enter,
    Esc,
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Backspace,
    Delete,
    CtrlC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    Key(Key),
    Resize(u16, u16),
}

/// Wait up to `timeout` for one event. Unmapped events resolve to `None`
/// just like an expired timeout; the caller's pacing loop treats both as an
/// idle quantum.
pub fn poll_event(timeout: Duration) -> Result<Option<TermEvent>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) => Ok(map_key(key).map(TermEvent::Key)),
        Event::Resize(cols, rows) => Ok(Some(TermEvent::Resize(cols, rows))),
        _ => Ok(None),
    }
}

fn map_key(key: KeyEvent) -> Option<Key> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    Some(match key.code {
        KeyCode::Char('c') if ctrl => Key::CtrlC,
        // Readline-style line movement.
        KeyCode::Char('a') if ctrl => Key::Home,
        KeyCode::Char('e') if ctrl => Key::End,
        KeyCode::Char(c) if alt => Key::Alt(c),
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::F(n) => Key::F(n),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn plain_characters_pass_through() {
        assert_eq!(
            map_key(press(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Key::Char('q'))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('5'), KeyModifiers::NONE)),
            Some(Key::Char('5'))
        );
    }

    #[test]
    fn control_c_is_distinct() {
        assert_eq!(
            map_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Key::CtrlC)
        );
    }

    #[test]
    fn alt_digit_maps_to_alt_key() {
        assert_eq!(
            map_key(press(KeyCode::Char('3'), KeyModifiers::ALT)),
            Some(Key::Alt('3'))
        );
    }

    #[test]
    fn readline_home_end_aliases() {
        assert_eq!(
            map_key(press(KeyCode::Char('a'), KeyModifiers::CONTROL)),
            Some(Key::Home)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            Some(Key::End)
        );
    }

    #[test]
    fn other_control_chords_are_dropped() {
        assert_eq!(
            map_key(press(KeyCode::Char('w'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn release_events_are_dropped() {
        let mut key = press(KeyCode::Char('x'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }
}
