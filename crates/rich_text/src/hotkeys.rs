//! Chord parsing and the chord-to-command table.
//!
//! Chords read like `mod+shift?+z`: modifiers joined by `+`, the key last. A
//! modifier followed by `?` may be held or not; a modifier left out must not
//! be held. `mod` is cmd on Apple platforms and ctrl elsewhere.

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::Platform;
use crate::error::HotkeyError;
use crate::state::ModifierState;

/// A key press as the host reports it. `key` is the produced key name
/// (`"z"`, `"ArrowLeft"`, `"Backspace"`, `" "`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: ModifierState,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: ModifierState::default(),
        }
    }

    pub fn alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.modifiers.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Alt,
    Ctrl,
    Meta,
    Shift,
}

/// `None` means the modifier may be in either state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    alt: Option<bool>,
    ctrl: Option<bool>,
    meta: Option<bool>,
    shift: Option<bool>,
    key: String,
}

impl Hotkey {
    pub fn parse(chord: &str, platform: Platform) -> Result<Self, HotkeyError> {
        let mut hotkey = Hotkey {
            alt: Some(false),
            ctrl: Some(false),
            meta: Some(false),
            shift: Some(false),
            key: String::new(),
        };

        let parts: Vec<&str> = if chord == "+" {
            vec!["+"]
        } else {
            chord.split('+').collect()
        };
        let Some((key, modifiers)) = parts.split_last() else {
            return Err(HotkeyError::new(chord, "empty chord"));
        };

        for part in modifiers {
            let (name, optional) = match part.strip_suffix('?') {
                Some(name) => (name, true),
                None => (*part, false),
            };
            let Some(modifier) = modifier(&name.to_lowercase(), platform) else {
                return Err(HotkeyError::new(chord, format!("unknown modifier {name:?}")));
            };
            let state = if optional { None } else { Some(true) };
            match modifier {
                Modifier::Alt => hotkey.alt = state,
                Modifier::Ctrl => hotkey.ctrl = state,
                Modifier::Meta => hotkey.meta = state,
                Modifier::Shift => hotkey.shift = state,
            }
        }

        if key.is_empty() {
            return Err(HotkeyError::new(chord, "missing key"));
        }
        let key = key.to_lowercase();
        hotkey.key = key_alias(&key).unwrap_or(key.as_str()).to_string();
        Ok(hotkey)
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        let held = event.modifiers;
        let wants = |expected: Option<bool>, actual: bool| expected.is_none_or(|e| e == actual);
        wants(self.alt, held.alt)
            && wants(self.ctrl, held.ctrl)
            && wants(self.meta, held.meta)
            && wants(self.shift, held.shift)
            && self.key == event.key.to_lowercase()
    }
}

fn modifier(name: &str, platform: Platform) -> Option<Modifier> {
    Some(match name {
        "alt" | "option" | "opt" => Modifier::Alt,
        "ctrl" | "control" | "ctl" => Modifier::Ctrl,
        "meta" | "cmd" | "command" | "win" | "windows" => Modifier::Meta,
        "shift" => Modifier::Shift,
        "mod" if platform.is_apple() => Modifier::Meta,
        "mod" => Modifier::Ctrl,
        _ => return None,
    })
}

fn key_alias(name: &str) -> Option<&'static str> {
    Some(match name {
        "add" => "+",
        "break" => "pause",
        "del" => "delete",
        "down" => "arrowdown",
        "esc" => "escape",
        "ins" => "insert",
        "left" => "arrowleft",
        "return" => "enter",
        "right" => "arrowright",
        "space" | "spacebar" => " ",
        "up" => "arrowup",
        _ => return None,
    })
}

const GENERIC: &[(&str, &str)] = &[
    ("mod+b", "marks.toggle_bold"),
    ("mod+i", "marks.toggle_italic"),
    ("mod+u", "marks.toggle_underline"),
    ("mod+e", "marks.toggle_code"),
    ("mod+shift+x", "marks.toggle_strikethrough"),
    ("left", "selection.move_backward"),
    ("right", "selection.move_forward"),
    ("ctrl+left", "selection.move_word_backward"),
    ("ctrl+right", "selection.move_word_forward"),
    ("shift+left", "selection.extend_backward"),
    ("shift+right", "selection.extend_forward"),
    ("shift?+backspace", "editing.delete_backward"),
    ("shift?+delete", "editing.delete_forward"),
    ("shift+enter", "editing.insert_soft_break"),
    ("enter", "editing.insert_break"),
    ("mod+z", "history.undo"),
];

const APPLE: &[(&str, &str)] = &[
    ("opt+up", "selection.move_line_backward"),
    ("opt+down", "selection.move_line_forward"),
    ("opt+left", "selection.move_word_backward"),
    ("opt+right", "selection.move_word_forward"),
    ("opt+shift+up", "selection.extend_line_backward"),
    ("opt+shift+down", "selection.extend_line_forward"),
    ("ctrl+backspace", "editing.delete_backward"),
    ("ctrl+h", "editing.delete_backward"),
    ("ctrl+delete", "editing.delete_forward"),
    ("ctrl+d", "editing.delete_forward"),
    ("cmd+shift?+backspace", "editing.delete_line_backward"),
    ("cmd+shift?+delete", "editing.delete_line_forward"),
    ("ctrl+k", "editing.delete_line_forward"),
    ("opt+shift?+backspace", "editing.delete_word_backward"),
    ("opt+shift?+delete", "editing.delete_word_forward"),
    ("cmd+shift+z", "history.redo"),
];

const WINDOWS: &[(&str, &str)] = &[
    ("ctrl+shift?+backspace", "editing.delete_word_backward"),
    ("ctrl+shift?+delete", "editing.delete_word_forward"),
    ("ctrl+y", "history.redo"),
    ("ctrl+shift+z", "history.redo"),
];

const OTHER: &[(&str, &str)] = &[
    ("ctrl+shift?+backspace", "editing.delete_word_backward"),
    ("ctrl+shift?+delete", "editing.delete_word_forward"),
    ("ctrl+shift+z", "history.redo"),
];

/// Chords in lookup order. The first matching chord wins.
#[derive(Debug, Clone, Default)]
pub struct HotkeyTable {
    bindings: Vec<(Hotkey, String)>,
}

impl HotkeyTable {
    /// Parses a host-supplied `{chord -> command}` table.
    pub fn from_map(
        map: &BTreeMap<String, String>,
        platform: Platform,
    ) -> Result<Self, HotkeyError> {
        let bindings = map
            .iter()
            .map(|(chord, command)| Ok((Hotkey::parse(chord, platform)?, command.clone())))
            .collect::<Result<Vec<_>, HotkeyError>>()?;
        Ok(Self { bindings })
    }

    pub fn defaults(platform: Platform) -> Self {
        let specific = match platform {
            Platform::Apple => APPLE,
            Platform::Windows => WINDOWS,
            Platform::Other => OTHER,
        };
        let mut table = Self::default();
        for (chord, command) in specific.iter().chain(GENERIC) {
            match Hotkey::parse(chord, platform) {
                Ok(hotkey) => table.bindings.push((hotkey, command.to_string())),
                Err(err) => warn!(%err, "skipping default hotkey"),
            }
        }
        table
    }

    /// Adds a binding that takes precedence over the existing ones.
    pub fn bind(
        &mut self,
        chord: &str,
        command: impl Into<String>,
        platform: Platform,
    ) -> Result<(), HotkeyError> {
        let hotkey = Hotkey::parse(chord, platform)?;
        self.bindings.insert(0, (hotkey, command.into()));
        Ok(())
    }

    pub fn resolve(&self, event: &KeyEvent) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(hotkey, _)| hotkey.matches(event))
            .map(|(_, command)| command.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
