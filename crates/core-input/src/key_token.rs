use core_events::{InputEvent, KeyCode, KeyEvent, ModMask, MouseButton, MouseEvent, MouseEventKind};
use crossterm::event::{
    Event as CEvent, KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers, MouseButton as CMouseButton, MouseEvent as CMouseEvent,
    MouseEventKind as CMouseEventKind,
};

/// Map a terminal event into a console input event.
///
/// Returns `None` for events the console does not consume (key releases,
/// unsupported keys, horizontal scroll).
pub(crate) fn map_event(event: CEvent) -> Option<InputEvent> {
    match event {
        CEvent::Key(key) => map_key_event(&key).map(InputEvent::Key),
        CEvent::Mouse(mouse) => map_mouse_event(&mouse).map(InputEvent::Mouse),
        CEvent::Paste(data) => Some(InputEvent::Paste(data)),
        CEvent::Resize(w, h) => Some(InputEvent::Resize(w, h)),
        CEvent::FocusGained => Some(InputEvent::FocusGained),
        CEvent::FocusLost => Some(InputEvent::FocusLost),
    }
}

/// Map a crossterm key event into a console key event.
///
/// Only presses and repeats are forwarded.
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<KeyEvent> {
    if !matches!(event.kind, CKeyEventKind::Press | CKeyEventKind::Repeat) {
        return None;
    }
    let code = map_key_code(&event.code)?;
    Some(KeyEvent::new(code, map_mod_mask(event.modifiers)))
}

pub(crate) fn map_key_code(code: &CKeyCode) -> Option<KeyCode> {
    let mapped = match code {
        CKeyCode::Char(c) => KeyCode::Char(*c),
        CKeyCode::Enter => KeyCode::Enter,
        CKeyCode::Esc => KeyCode::Esc,
        CKeyCode::Backspace => KeyCode::Backspace,
        CKeyCode::Tab | CKeyCode::BackTab => KeyCode::Tab,
        CKeyCode::Up => KeyCode::Up,
        CKeyCode::Down => KeyCode::Down,
        CKeyCode::Left => KeyCode::Left,
        CKeyCode::Right => KeyCode::Right,
        CKeyCode::Home => KeyCode::Home,
        CKeyCode::End => KeyCode::End,
        CKeyCode::PageUp => KeyCode::PageUp,
        CKeyCode::PageDown => KeyCode::PageDown,
        CKeyCode::Insert => KeyCode::Insert,
        CKeyCode::Delete => KeyCode::Delete,
        CKeyCode::F(n) => KeyCode::F(*n),
        CKeyCode::Null
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::KeypadBegin
        | CKeyCode::Media(_)
        | CKeyCode::Modifier(_) => return None,
    };
    Some(mapped)
}

pub(crate) fn map_mouse_event(event: &CMouseEvent) -> Option<MouseEvent> {
    let kind = match event.kind {
        CMouseEventKind::Down(b) => MouseEventKind::Down(map_button(b)),
        CMouseEventKind::Up(b) => MouseEventKind::Up(map_button(b)),
        CMouseEventKind::Drag(b) => MouseEventKind::Drag(map_button(b)),
        CMouseEventKind::ScrollUp => MouseEventKind::ScrollUp,
        CMouseEventKind::ScrollDown => MouseEventKind::ScrollDown,
        CMouseEventKind::Moved => MouseEventKind::Moved,
        CMouseEventKind::ScrollLeft | CMouseEventKind::ScrollRight => return None,
    };
    Some(MouseEvent {
        kind,
        column: event.column,
        row: event.row,
        mods: map_mod_mask(event.modifiers),
    })
}

fn map_button(b: CMouseButton) -> MouseButton {
    match b {
        CMouseButton::Left => MouseButton::Left,
        CMouseButton::Middle => MouseButton::Middle,
        CMouseButton::Right => MouseButton::Right,
    }
}

/// Convert crossterm modifier flags into the console `ModMask` bits.
pub(crate) fn map_mod_mask(mods: CKeyModifiers) -> ModMask {
    let mut out = ModMask::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= ModMask::CTRL;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= ModMask::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= ModMask::SHIFT;
    }
    if mods.contains(CKeyModifiers::SUPER) {
        out |= ModMask::SUPER;
    }
    if mods.contains(CKeyModifiers::META) {
        out |= ModMask::META;
    }
    out
}
