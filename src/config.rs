//! # Translation Options
//!
//! Host-facing settings for a translation pass, loadable from JSON.
//!
//! ```json
//! { "show_errors": true, "rules_path": "rules/custom.json" }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed options: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Diagnostic mode: failed materials render as a magenta emitter
    /// instead of neutral gray
    pub show_errors: bool,
    /// Declarative rules to use in place of the built-in table
    pub rules_path: Option<PathBuf>,
}

impl TranslateOptions {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let options = Self::from_json_str(&json)?;
        tracing::info!("[TRANSLATE] Options loaded from {}", path.display());
        Ok(options)
    }

    pub fn with_show_errors(mut self, show_errors: bool) -> Self {
        self.show_errors = show_errors;
        self
    }

    pub fn with_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }
}
