use serde::{Deserialize, Serialize};

use crate::error::ApplyError;
use crate::node::Document;

const DEFAULT_SCHEMA: &str = "canvas-plate";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// The persisted form of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl PlateValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Rejects snapshots written under another schema or a newer version.
    pub fn validated(self) -> Result<Self, ApplyError> {
        if self.schema != DEFAULT_SCHEMA {
            return Err(ApplyError::Serde(format!(
                "unknown schema {:?}, expected {DEFAULT_SCHEMA:?}",
                self.schema
            )));
        }
        if self.version > DEFAULT_VERSION {
            return Err(ApplyError::Serde(format!(
                "unsupported version {} (newest is {DEFAULT_VERSION})",
                self.version
            )));
        }
        Ok(self)
    }
}
