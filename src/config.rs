//! Parser configuration.
//!
//! Limits can be given in code or loaded from JSON; missing fields take their
//! defaults:
//!
//! ```
//! use kast::config::ParseLimits;
//!
//! let limits = ParseLimits::from_json(r#"{ "max_depth": 64 }"#).unwrap();
//! assert_eq!(limits.max_depth, 64);
//! assert_eq!(limits.max_nodes, ParseLimits::default().max_nodes);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Bounds on the size of accepted input. Exceeding either fails with
/// [`ErrorKind::InputTooComplex`](crate::wat::ErrorKind::InputTooComplex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseLimits {
    /// Deepest parenthesis nesting the reader and parser will descend into.
    pub max_depth: usize,
    /// Most parse-tree nodes a single input may contain.
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_nodes: 1_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ParseLimits {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let limits: ParseLimits = serde_json::from_str(text)?;
        limits.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.max_nodes == 0 {
            return Err(ConfigError::Invalid("max_nodes must be at least 1".into()));
        }
        Ok(self)
    }
}
