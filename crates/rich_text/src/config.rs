use std::collections::BTreeMap;

use canvas_plate_core::EditorConfig;
use serde::{Deserialize, Serialize};

/// Block-start prefixes that, typed and followed by a space, trigger a
/// markdown shortcut. Composition diffs ending in one of these flush early.
const DEFAULT_SHORTCUT_TRIGGERS: &[&str] = &["*", "-", "+", "1.", ">", "#", "-[]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// `mod` means cmd.
    Apple,
    Windows,
    #[default]
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_vendor = "apple") {
            Platform::Apple
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn is_apple(self) -> bool {
        self == Platform::Apple
    }
}

/// How the host reports typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// One classified before-input event per keystroke.
    #[default]
    BeforeInput,
    /// Periodic text diff batches, for hosts whose per-key events are unreliable.
    Diff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditableConfig {
    pub platform: Platform,
    pub input_mode: InputMode,
    pub read_only: bool,
    /// Shown over an empty document.
    pub placeholder: Option<String>,
    /// Chord to command id. `None` uses the platform defaults.
    pub hotkeys: Option<BTreeMap<String, String>>,
    pub shortcut_triggers: Vec<String>,
    /// Used when the editable builds its own [`canvas_plate_core::Editor`].
    pub editor: EditorConfig,
}

impl Default for EditableConfig {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            input_mode: InputMode::default(),
            read_only: false,
            placeholder: None,
            hotkeys: None,
            shortcut_triggers: DEFAULT_SHORTCUT_TRIGGERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            editor: EditorConfig::default(),
        }
    }
}

impl EditableConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(text.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
