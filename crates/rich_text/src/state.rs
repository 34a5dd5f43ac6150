use crate::hotkeys::KeyEvent;

/// Per-editable interaction flags. Owned by one [`crate::Editable`] and
/// dropped with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableState {
    pub composing: bool,
    pub focused: bool,
    pub read_only: bool,
    /// The engine is writing the host selection; echoes are ignored.
    pub updating_selection: bool,
    pub dragging: bool,
    /// A pending-marks preview run is on screen.
    pub has_mark_placeholder: bool,
}

impl EditableState {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            ..Self::default()
        }
    }
}

/// Modifier keys currently held, tracked from key down/up events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl ModifierState {
    pub fn any(&self) -> bool {
        self.alt || self.ctrl || self.meta || self.shift
    }

    /// Takes the flags reported with `event`, then applies the key itself
    /// when it is a modifier.
    pub fn record(&mut self, event: &KeyEvent, pressed: bool) {
        *self = event.modifiers;
        match event.key.as_str() {
            "Alt" => self.alt = pressed,
            "Control" => self.ctrl = pressed,
            "Meta" => self.meta = pressed,
            "Shift" => self.shift = pressed,
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
