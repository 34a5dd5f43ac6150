use thiserror::Error;

use crate::path::Path;
use crate::point::Point;

/// Errors raised while applying operations to a document.
///
/// A failed batch is rolled back before the error reaches the caller, so the
/// document is always left at its last normalized state.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ApplyError {
    /// A path no longer resolves, or resolves to the wrong kind of node.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: Path, reason: String },

    /// A point's offset is outside its leaf.
    #[error("invalid point {0:?}")]
    InvalidPoint(Point),

    /// Normalization kept producing repairs past its iteration budget.
    #[error("normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),

    /// Normalization reached a fixed point that still breaks a document invariant.
    #[error("document invariant violated: {0}")]
    InvariantViolation(String),

    /// A snapshot could not be decoded.
    #[error("serialization error: {0}")]
    Serde(String),
}

impl ApplyError {
    pub(crate) fn invalid_path(path: &[usize], reason: impl Into<String>) -> Self {
        ApplyError::InvalidPath {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ApplyError {
    fn from(err: serde_json::Error) -> Self {
        ApplyError::Serde(err.to_string())
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ApplyError> for CommandError {
    fn from(err: ApplyError) -> Self {
        CommandError::new(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("duplicate node spec kind: {0}")]
    DuplicateKind(String),

    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
}
