//! Key mapping for terminal input
//!
//! Converts crossterm key and mouse events to editor keys and pointer
//! events.

use bitflags::bitflags;
use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::editor::{Key, Point, Pointer};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting terminal events to editor input
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to a key name. Releases and keys we have
    /// no name for map to `None`.
    pub fn map(event: &KeyEvent) -> Option<Key> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),
            KeyCode::Enter => Some(Key::Enter),
            KeyCode::Tab | KeyCode::BackTab => Some(Key::Tab),
            KeyCode::Backspace => Some(Key::Backspace),
            KeyCode::Delete => Some(Key::Delete),
            KeyCode::Esc => Some(Key::Esc),

            KeyCode::Up => Some(Key::Up),
            KeyCode::Down => Some(Key::Down),
            KeyCode::Right => Some(Key::Right),
            KeyCode::Left => Some(Key::Left),

            KeyCode::Home if mods.contains(Modifiers::CTRL) => Some(Key::CtrlHome),
            KeyCode::End if mods.contains(Modifiers::CTRL) => Some(Key::CtrlEnd),
            KeyCode::Home => Some(Key::Home),
            KeyCode::End => Some(Key::End),
            KeyCode::PageUp => Some(Key::PageUp),
            KeyCode::PageDown => Some(Key::PageDown),

            KeyCode::F(n) => Some(Key::F(n)),

            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> Key {
        if mods.contains(Modifiers::CTRL) {
            // Control codes that have their own key names
            return match ch.to_ascii_lowercase() {
                'j' | 'm' => Key::Enter,
                'i' => Key::Tab,
                'h' => Key::Backspace,
                '[' => Key::Esc,
                c => Key::Ctrl(c),
            };
        }

        if mods.contains(Modifiers::ALT) {
            return Key::Alt(ch);
        }

        Key::Char(ch)
    }

    /// Map a crossterm MouseEvent to a pointer event at its terminal cell.
    /// Only the left button and the wheel are used.
    pub fn map_mouse(event: &MouseEvent) -> Option<Pointer> {
        let cell = Point::new(i32::from(event.column), i32::from(event.row));

        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => Some(Pointer::Press(cell)),
            MouseEventKind::Drag(MouseButton::Left) => Some(Pointer::Drag(cell)),
            MouseEventKind::Up(MouseButton::Left) => Some(Pointer::Release(cell)),
            MouseEventKind::ScrollUp => Some(Pointer::WheelUp(cell)),
            MouseEventKind::ScrollDown => Some(Pointer::WheelDown(cell)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    fn mouse_event(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::Char('a')));

        let event = key_event(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(Key::Char('A')));

        let event = key_event(KeyCode::Char('C'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(Key::Ctrl('c')));

        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), Some(Key::Alt('x')));
    }

    #[test]
    fn test_control_aliases() {
        let ctrl = |c| KeyMapper::map(&key_event(KeyCode::Char(c), KeyModifiers::CONTROL));
        assert_eq!(ctrl('j'), Some(Key::Enter));
        assert_eq!(ctrl('m'), Some(Key::Enter));
        assert_eq!(ctrl('i'), Some(Key::Tab));
        assert_eq!(ctrl('h'), Some(Key::Backspace));
        assert_eq!(ctrl('['), Some(Key::Esc));
    }

    #[test]
    fn test_navigation_keys() {
        let event = key_event(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::Up));

        let event = key_event(KeyCode::End, KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(Key::CtrlEnd));

        let event = key_event(KeyCode::Home, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::Home));

        let event = key_event(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::F(5)));

        let event = key_event(KeyCode::Insert, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_release_ignored() {
        let mut event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_mouse_events() {
        let event = mouse_event(MouseEventKind::Down(MouseButton::Left), 10, 5);
        assert_eq!(
            KeyMapper::map_mouse(&event),
            Some(Pointer::Press(Point::new(10, 5)))
        );

        let event = mouse_event(MouseEventKind::Drag(MouseButton::Left), 0, 0);
        assert_eq!(
            KeyMapper::map_mouse(&event),
            Some(Pointer::Drag(Point::new(0, 0)))
        );

        let event = mouse_event(MouseEventKind::ScrollDown, 3, 4);
        assert_eq!(
            KeyMapper::map_mouse(&event),
            Some(Pointer::WheelDown(Point::new(3, 4)))
        );

        let event = mouse_event(MouseEventKind::Down(MouseButton::Right), 1, 1);
        assert_eq!(KeyMapper::map_mouse(&event), None);

        let event = mouse_event(MouseEventKind::Moved, 1, 1);
        assert_eq!(KeyMapper::map_mouse(&event), None);
    }
}
