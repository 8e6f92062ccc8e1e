use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A key press the typing engine understands.
///
/// Modifier-only presses never become a `Key`; they are dropped at the
/// conversion boundary so the engine never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Space,
    Backspace,
}

impl Key {
    /// Convert a terminal key event. Releases, modifier presses and control
    /// chords yield `None`.
    pub fn from_event(event: &KeyEvent) -> Option<Key> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        if event
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return None;
        }
        match event.code {
            KeyCode::Char(' ') => Some(Key::Space),
            KeyCode::Char(c) => Some(Key::Char(c)),
            KeyCode::Backspace => Some(Key::Backspace),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_event_char_and_space() {
        let ev = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(Key::from_event(&ev), Some(Key::Char('a')));

        let ev = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(Key::from_event(&ev), Some(Key::Space));

        let ev = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(Key::from_event(&ev), Some(Key::Char('A')));
    }

    #[test]
    fn test_from_event_filters_modifiers_and_chords() {
        let ev = KeyEvent::new(
            KeyCode::Modifier(crossterm::event::ModifierKeyCode::LeftShift),
            KeyModifiers::SHIFT,
        );
        assert_eq!(Key::from_event(&ev), None);

        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from_event(&ev), None);

        let ev = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(Key::from_event(&ev), None);
    }

    #[test]
    fn test_from_event_ignores_release() {
        let mut ev = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        ev.kind = KeyEventKind::Release;
        assert_eq!(Key::from_event(&ev), None);
    }
}
