use canvas_plate_core::{ApplyError, CommandError, Point};
use thiserror::Error;

use crate::host::HostHandle;

/// Failures while mapping between the document and the host surface.
///
/// Only the `Apply` and `Command` variants carry failures out of the engine;
/// the others describe coordinates that could not be resolved and are usually
/// recovered from by treating the selection as absent.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum BridgeError {
    /// The host selection sits outside the managed tree or inside a
    /// non-editable spacer.
    #[error("host selection cannot be resolved to a document range")]
    UnresolvableHostSelection,

    #[error("point {0:?} has no rendered counterpart")]
    InvalidPoint(Point),

    #[error("host handle {0:?} is not mounted")]
    Unmounted(HostHandle),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid hotkey {chord:?}: {reason}")]
pub struct HotkeyError {
    pub chord: String,
    pub reason: String,
}

impl HotkeyError {
    pub(crate) fn new(chord: &str, reason: impl Into<String>) -> Self {
        Self {
            chord: chord.to_string(),
            reason: reason.into(),
        }
    }
}
